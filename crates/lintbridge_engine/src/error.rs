//! Engine error types.

use std::path::PathBuf;

use lintbridge_resolver::PackageManager;
use thiserror::Error;

/// Errors raised while talking to a Node.js child process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No `node` executable on `PATH`.
    #[error("Node.js runtime not found: {0}")]
    NodeNotFound(#[from] which::Error),

    /// The child process could not be started or fed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The script exited unsuccessfully.
    #[error("{message}")]
    Exit { code: Option<i32>, message: String },

    /// The script produced no result or an unparsable one.
    #[error("Invalid bridge output: {0}")]
    InvalidOutput(String),
}

/// Errors raised while importing a located module.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The module threw while loading.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The module loaded but lacks a required export.
    #[error("module does not export `{0}`")]
    MissingExport(String),
}

/// Errors raised by the engine's rule loader.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    /// The rule name is not a single path segment.
    #[error("Invalid rule name: {0}")]
    InvalidName(String),

    /// No module exists for the rule.
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// The rule module threw while loading.
    #[error("Failed to load rule '{name}': {source}")]
    Import {
        name: String,
        #[source]
        source: ImportError,
    },
}

/// Errors raised by a single lint or configuration call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Rule(#[from] RuleLoadError),

    /// The engine rejected the request.
    #[error("{0}")]
    Engine(String),
}

impl EngineError {
    /// Creates an engine-reported error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }
}

/// Why the engine could not be loaded.
///
/// Variants are ordered by diagnosis precedence: an engine that is not
/// installed is reported as such before any version or structural check.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "{package} is not installed. Install it in {} or globally with {manager}.",
        cwd.display()
    )]
    NotInstalled {
        package: String,
        cwd: PathBuf,
        manager: PackageManager,
        trace: Vec<String>,
    },

    #[error(
        "{package} {found} is installed at {}, but {required} is required. Please update it.",
        path.display()
    )]
    VersionTooLow {
        package: String,
        found: String,
        required: String,
        path: PathBuf,
    },

    #[error(
        "{package} at {} is not published as an ES module. Please update it.",
        path.display()
    )]
    WrongModuleFormat { package: String, path: PathBuf },

    #[error("{package} at {} cannot be loaded: {detail}", path.display())]
    Incompatible {
        package: String,
        path: PathBuf,
        detail: String,
    },

    #[error("Failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: ImportError,
    },
}

impl LoadError {
    /// A stable identifier for the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotInstalled { .. } => "not-installed",
            LoadError::VersionTooLow { .. } => "version-too-low",
            LoadError::WrongModuleFormat { .. } => "wrong-module-format",
            LoadError::Incompatible { .. } => "incompatible",
            LoadError::Import { .. } => "import-failed",
        }
    }

    /// Resolution notes collected while looking for the engine.
    pub fn trace(&self) -> &[String] {
        match self {
            LoadError::NotInstalled { trace, .. } => trace,
            _ => &[],
        }
    }
}
