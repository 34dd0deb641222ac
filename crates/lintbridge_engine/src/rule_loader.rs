//! Lazy, cached loading of individual engine rules.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use lintbridge_resolver::{ModuleResolver, PackageManager, TraceLog};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::EngineSpec;
use crate::error::RuleLoadError;
use crate::provider::ModuleImporter;
use crate::surface::RuleMeta;

/// An imported rule module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleModule {
    pub name: String,
    pub path: PathBuf,
    pub meta: Option<RuleMeta>,
}

/// Loads rules of one engine instance.
///
/// Loaded rules are kept for the lifetime of the loader. Rule modules are
/// assumed immutable while the engine that owns this loader is current.
pub struct RuleLoader {
    spec: EngineSpec,
    cwd: PathBuf,
    manager: PackageManager,
    resolver: Arc<ModuleResolver>,
    importer: Arc<dyn ModuleImporter>,
    cache: Mutex<HashMap<String, Arc<RuleModule>>>,
}

impl RuleLoader {
    /// Creates a loader resolving rules from `cwd` with `manager`.
    pub fn new(
        spec: EngineSpec,
        cwd: impl Into<PathBuf>,
        manager: PackageManager,
        resolver: Arc<ModuleResolver>,
        importer: Arc<dyn ModuleImporter>,
    ) -> Self {
        Self {
            spec,
            cwd: cwd.into(),
            manager,
            resolver,
            importer,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the rule module for `name`, importing it on first use.
    pub async fn load(&self, name: &str) -> Result<Arc<RuleModule>, RuleLoadError> {
        if let Some(hit) = self.cache.lock().get(name) {
            return Ok(hit.clone());
        }

        if !is_single_segment(name) {
            return Err(RuleLoadError::InvalidName(name.to_string()));
        }

        let request = self.spec.rule_request(name);
        let trace = TraceLog::new();
        let resolved = self
            .resolver
            .resolve(&self.cwd, &request, self.manager, &trace)
            .await
            .ok_or_else(|| RuleLoadError::NotFound(name.to_string()))?;

        debug!("Loading rule '{}' from {}", name, resolved.path.display());
        let module = self
            .importer
            .import_rule(name, &resolved.path)
            .await
            .map_err(|source| RuleLoadError::Import {
                name: name.to_string(),
                source,
            })?;

        // A concurrent load of the same rule may have finished first.
        let mut cache = self.cache.lock();
        Ok(cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(module))
            .clone())
    }

    /// Number of rules loaded so far.
    pub fn loaded_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// The package manager used for rule resolution.
    pub fn package_manager(&self) -> PackageManager {
        self.manager
    }
}

/// Accepts names made of exactly one normal path component.
fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.ends_with('/')
        && !name.contains('\\')
}
