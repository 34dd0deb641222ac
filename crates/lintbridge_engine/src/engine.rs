//! A loaded, version-checked engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;

use crate::rule_loader::RuleLoader;
use crate::surface::{CliSurface, LinterSurface};

/// Capabilities of one engine installation.
///
/// Immutable once built; a reload produces a new instance.
pub struct LoadedEngine {
    version: Version,
    module_path: PathBuf,
    linter: Arc<dyn LinterSurface>,
    cli: Arc<dyn CliSurface>,
    presets_root: PathBuf,
    rule_loader: Arc<RuleLoader>,
}

impl LoadedEngine {
    pub fn new(
        version: Version,
        module_path: PathBuf,
        linter: Arc<dyn LinterSurface>,
        cli: Arc<dyn CliSurface>,
        presets_root: PathBuf,
        rule_loader: Arc<RuleLoader>,
    ) -> Self {
        Self {
            version,
            module_path,
            linter,
            cli,
            presets_root,
            rule_loader,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Absolute path of the engine's main entry file.
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn linter(&self) -> &Arc<dyn LinterSurface> {
        &self.linter
    }

    pub fn cli(&self) -> &Arc<dyn CliSurface> {
        &self.cli
    }

    /// Directory holding the presets bundled with the engine.
    pub fn presets_root(&self) -> &Path {
        &self.presets_root
    }

    pub fn rule_loader(&self) -> &Arc<RuleLoader> {
        &self.rule_loader
    }

    /// Whether `other` refers to the same installation.
    pub fn same_installation(&self, other: &LoadedEngine) -> bool {
        self.version == other.version && self.module_path == other.module_path
    }
}

impl fmt::Debug for LoadedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedEngine")
            .field("version", &self.version)
            .field("module_path", &self.module_path)
            .field("presets_root", &self.presets_root)
            .finish_non_exhaustive()
    }
}
