//! Seams between engine loading and the outside world.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::LoadedEngine;
use crate::error::{ImportError, LoadError};
use crate::rule_loader::RuleModule;
use crate::surface::{CliSurface, LinterSurface};

/// Produces a loaded engine for a workspace.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// Attempts to locate, import and version-check the engine for `cwd`.
    ///
    /// Each call resolves independently; an `Err` carries the diagnosis.
    async fn try_load(&self, cwd: &Path) -> Result<Arc<LoadedEngine>, LoadError>;
}

/// What the main entry point of the engine exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineModule {
    /// Version declared by the module itself.
    pub version: Option<String>,
    /// Names of the module's exports.
    pub exports: Vec<String>,
}

/// Imports located modules.
#[async_trait]
pub trait ModuleImporter: Send + Sync {
    async fn import_main(&self, entry: &Path) -> Result<EngineModule, ImportError>;

    async fn import_linter(&self, entry: &Path) -> Result<Arc<dyn LinterSurface>, ImportError>;

    async fn import_cli(&self, entry: &Path) -> Result<Arc<dyn CliSurface>, ImportError>;

    async fn import_rule(&self, name: &str, entry: &Path) -> Result<RuleModule, ImportError>;
}
