//! Engine identity and effective lint configuration.

use std::collections::BTreeMap;

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration files understood by the engine's config resolver.
pub const CONFIG_FILES: &[&str] = &[
    ".lintbridgerc",
    ".lintbridgerc.json",
    "lintbridge.config.json",
];

/// Ignore files understood by the engine's config resolver.
pub const IGNORE_FILES: &[&str] = &[".lintbridgeignore"];

/// Default engine package.
pub const DEFAULT_PACKAGE: &str = "@lintbridge/engine";

/// Oldest engine release whose contract this server speaks.
pub const MIN_ENGINE_VERSION: &str = ">=0.14.0";

/// Which package is the engine and which releases are accepted.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    /// npm package name.
    pub package: String,
    /// Versions the loaded engine must satisfy.
    pub min_version: VersionReq,
    /// Sub-path export of the linter capability.
    pub linter_entry: String,
    /// Sub-path export of the config/CLI capability.
    pub cli_entry: String,
    /// Directory (sub-path) holding individual rule modules.
    pub rules_dir: String,
    /// Directory holding bundled presets, relative to the package root.
    pub presets_dir: String,
    /// Directory levels between the main entry file and the package root.
    pub presets_depth: usize,
}

impl EngineSpec {
    /// Creates a spec for `package` with the default layout.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Self::default()
        }
    }

    /// The bare request for a sub-path of the engine package.
    pub fn request(&self, subpath: &str) -> String {
        if subpath.is_empty() {
            self.package.clone()
        } else {
            format!("{}/{}", self.package, subpath)
        }
    }

    /// The bare request for a rule module.
    pub fn rule_request(&self, rule: &str) -> String {
        format!("{}/{}/{}", self.package, self.rules_dir, rule)
    }
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            min_version: VersionReq::parse(MIN_ENGINE_VERSION)
                .unwrap_or(VersionReq::STAR),
            linter_entry: "linter".to_string(),
            cli_entry: "cli".to_string(),
            rules_dir: "rules".to_string(),
            presets_dir: "presets".to_string(),
            presets_depth: 2,
        }
    }
}

/// Effective configuration for one file, as produced by the engine's
/// config resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target platforms.
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Per-rule settings (`"off"`, `"warn"`, `["error", {...}]`, ...).
    #[serde(default)]
    pub rules: BTreeMap<String, Value>,
}

impl EngineConfig {
    /// Returns a copy with platforms sorted and deduplicated and the keys of
    /// nested rule options in sorted order.
    pub fn normalized(&self) -> Self {
        let mut platforms = self.platforms.clone();
        platforms.sort();
        platforms.dedup();
        Self {
            platforms,
            rules: self
                .rules
                .iter()
                .map(|(name, setting)| (name.clone(), canonical(setting)))
                .collect(),
        }
    }

    /// Computes a hash of the normalized configuration for cache keys.
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(&self.normalized()).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Names of rules not switched off.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|(_, setting)| !is_off(setting))
            .map(|(name, _)| name.as_str())
    }
}

/// Rebuilds objects with sorted keys, since `Map` may keep insertion order.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn is_off(setting: &Value) -> bool {
    match setting {
        Value::Bool(enabled) => !enabled,
        Value::Number(n) => n.as_u64() == Some(0),
        Value::String(s) => s == "off",
        Value::Array(items) => items.first().is_some_and(is_off),
        Value::Null => true,
        Value::Object(_) => false,
    }
}
