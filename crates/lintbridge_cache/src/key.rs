//! Cache key type.

use std::fmt;

/// Identifies one lint result.
///
/// Two lints of the same document revision under the same engine version and
/// effective configuration produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Document URI.
    pub uri: String,

    /// Version of the engine that produced the result.
    pub engine_version: String,

    /// Document revision supplied by the editor.
    pub revision: i32,

    /// Hash of the normalized effective configuration.
    pub config_hash: String,
}

impl CacheKey {
    pub fn new(
        uri: impl Into<String>,
        engine_version: impl Into<String>,
        revision: i32,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            engine_version: engine_version.into(),
            revision,
            config_hash: config_hash.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.uri, self.engine_version, self.revision, self.config_hash
        )
    }
}
