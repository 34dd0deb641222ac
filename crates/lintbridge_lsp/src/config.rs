//! Server settings.

use lintbridge_engine::PackageManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Section name under which editors send the settings.
pub const SETTINGS_SECTION: &str = "lintbridge";

/// Default quiet period before an edited document is linted.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default wait after an install-related file event before reloading.
pub const DEFAULT_INSTALL_SETTLE_MS: u64 = 2000;

/// Settings received from `initializationOptions` or
/// `workspace/didChangeConfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Whether linting is enabled at all.
    pub enable: bool,
    /// Whether lint results are cached.
    pub cache: bool,
    /// Package manager used to find a global engine install.
    pub package_manager: Option<PackageManager>,
    pub debounce_ms: u64,
    pub install_settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable: true,
            cache: true,
            package_manager: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            install_settle_ms: DEFAULT_INSTALL_SETTLE_MS,
        }
    }
}

impl Settings {
    /// Parses settings from either `{ "lintbridge": { ... } }` or the bare
    /// object. Returns `None` for null or malformed values.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let section = value.get(SETTINGS_SECTION).unwrap_or(value);
        serde_json::from_value(section.clone()).ok()
    }

    /// Whether switching to `other` requires a bulk refresh.
    pub fn differs_materially(&self, other: &Settings) -> bool {
        self.enable != other.enable || self.cache != other.cache
    }
}
