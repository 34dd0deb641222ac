//! Locating, importing and version-gating the engine package.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lintbridge_resolver::{
    ModuleResolver, PackageManager, TraceLog, TraceSink, detect_package_manager,
};
use semver::Version;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bridge::{NodeImporter, NodeRuntime};
use crate::config::EngineSpec;
use crate::engine::LoadedEngine;
use crate::error::LoadError;
use crate::provider::{EngineProvider, ModuleImporter};
use crate::rule_loader::RuleLoader;

/// Loads the engine from a workspace's `node_modules` or a global install.
pub struct NodeEngineProvider {
    spec: EngineSpec,
    resolver: Arc<ModuleResolver>,
    importer: Arc<dyn ModuleImporter>,
    package_manager: Option<PackageManager>,
}

impl NodeEngineProvider {
    pub fn new(
        spec: EngineSpec,
        resolver: Arc<ModuleResolver>,
        importer: Arc<dyn ModuleImporter>,
    ) -> Self {
        Self {
            spec,
            resolver,
            importer,
            package_manager: None,
        }
    }

    /// Creates a provider backed by real package managers and Node.js.
    pub fn system(spec: EngineSpec) -> Self {
        Self::new(
            spec,
            Arc::new(ModuleResolver::system()),
            Arc::new(NodeImporter::new(NodeRuntime::new())),
        )
    }

    /// Forces a package manager instead of detecting it from lockfiles.
    pub fn with_package_manager(mut self, manager: Option<PackageManager>) -> Self {
        self.package_manager = manager;
        self
    }

    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }

    fn package_manager_for(&self, cwd: &Path) -> PackageManager {
        self.package_manager
            .or_else(|| detect_package_manager(cwd))
            .unwrap_or_default()
    }

    async fn load(&self, cwd: &Path) -> Result<LoadedEngine, LoadError> {
        let manager = self.package_manager_for(cwd);
        let trace = TraceLog::new();
        trace.trace(&format!(
            "Looking for {} from {} using {manager}",
            self.spec.package,
            cwd.display()
        ));

        let main_request = self.spec.request("");
        let Some(main) = self
            .resolver
            .resolve(cwd, &main_request, manager, &trace)
            .await
        else {
            return Err(self.diagnose(cwd, manager, &trace).await);
        };
        info!(
            "Found {} ({}) at {}",
            self.spec.package,
            main.origin,
            main.path.display()
        );

        let module = self
            .importer
            .import_main(&main.path)
            .await
            .map_err(|source| LoadError::Import {
                path: main.path.clone(),
                source,
            })?;

        let declared = module
            .version
            .clone()
            .or_else(|| self.manifest_version_near(&main.path));
        let version = self.check_version(declared, &main.path)?;

        let linter_path = self
            .resolve_entry(cwd, &self.spec.linter_entry, manager, &trace, &main.path)
            .await?;
        let linter = self
            .importer
            .import_linter(&linter_path)
            .await
            .map_err(|source| LoadError::Import {
                path: linter_path,
                source,
            })?;

        let cli_path = self
            .resolve_entry(cwd, &self.spec.cli_entry, manager, &trace, &main.path)
            .await?;
        let cli = self
            .importer
            .import_cli(&cli_path)
            .await
            .map_err(|source| LoadError::Import {
                path: cli_path,
                source,
            })?;

        let presets_root = main
            .path
            .ancestors()
            .nth(self.spec.presets_depth)
            .unwrap_or(cwd)
            .join(&self.spec.presets_dir);

        let rule_loader = Arc::new(RuleLoader::new(
            self.spec.clone(),
            cwd,
            manager,
            self.resolver.clone(),
            self.importer.clone(),
        ));

        Ok(LoadedEngine::new(
            version,
            main.path,
            linter,
            cli,
            presets_root,
            rule_loader,
        ))
    }

    async fn resolve_entry(
        &self,
        cwd: &Path,
        entry: &str,
        manager: PackageManager,
        trace: &TraceLog,
        main: &Path,
    ) -> Result<PathBuf, LoadError> {
        let request = self.spec.request(entry);
        match self.resolver.resolve(cwd, &request, manager, trace).await {
            Some(resolved) => Ok(resolved.path),
            None => Err(LoadError::Incompatible {
                package: self.spec.package.clone(),
                path: main.to_path_buf(),
                detail: format!("'{request}' could not be resolved"),
            }),
        }
    }

    fn check_version(&self, declared: Option<String>, path: &Path) -> Result<Version, LoadError> {
        let Some(declared) = declared else {
            return Err(LoadError::Incompatible {
                package: self.spec.package.clone(),
                path: path.to_path_buf(),
                detail: "no version is declared".to_string(),
            });
        };

        let version = Version::parse(declared.trim()).map_err(|e| LoadError::Incompatible {
            package: self.spec.package.clone(),
            path: path.to_path_buf(),
            detail: format!("invalid version '{declared}': {e}"),
        })?;

        if !self.spec.min_version.matches(&version) {
            return Err(LoadError::VersionTooLow {
                package: self.spec.package.clone(),
                found: version.to_string(),
                required: self.spec.min_version.to_string(),
                path: path.to_path_buf(),
            });
        }
        Ok(version)
    }

    /// Explains why the main entry could not be resolved.
    ///
    /// Checks run in a fixed order: missing package, version, module format,
    /// then anything else.
    async fn diagnose(&self, cwd: &Path, manager: PackageManager, trace: &TraceLog) -> LoadError {
        let Some(manifest) = self
            .resolver
            .find_package_manifest(cwd, &self.spec.package, manager, trace)
            .await
        else {
            warn!("{} is not installed", self.spec.package);
            return LoadError::NotInstalled {
                package: self.spec.package.clone(),
                cwd: cwd.to_path_buf(),
                manager,
                trace: trace.take(),
            };
        };

        let path = manifest.path;
        debug!("Classifying unloadable package at {}", path.display());
        let json = match read_json(&path) {
            Some(json) => json,
            None => {
                return LoadError::Incompatible {
                    package: self.spec.package.clone(),
                    path,
                    detail: "package.json is unreadable".to_string(),
                };
            }
        };

        if let Some(declared) = json.get("version").and_then(Value::as_str)
            && let Err(err) = self.check_version(Some(declared.to_string()), &path)
            && matches!(err, LoadError::VersionTooLow { .. })
        {
            return err;
        }

        if !is_es_module(&json) {
            return LoadError::WrongModuleFormat {
                package: self.spec.package.clone(),
                path,
            };
        }

        LoadError::Incompatible {
            package: self.spec.package.clone(),
            path,
            detail: "the package entry point could not be resolved".to_string(),
        }
    }

    /// Reads the version from the engine's own `package.json` above `entry`.
    fn manifest_version_near(&self, entry: &Path) -> Option<String> {
        entry.ancestors().skip(1).find_map(|dir| {
            let json = read_json(&dir.join("package.json"))?;
            if json.get("name").and_then(Value::as_str) != Some(self.spec.package.as_str()) {
                return None;
            }
            json.get("version")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl EngineProvider for NodeEngineProvider {
    async fn try_load(&self, cwd: &Path) -> Result<Arc<LoadedEngine>, LoadError> {
        match self.load(cwd).await {
            Ok(engine) => {
                info!(
                    "Loaded {} {} from {}",
                    self.spec.package,
                    engine.version(),
                    engine.module_path().display()
                );
                Ok(Arc::new(engine))
            }
            Err(err) => {
                warn!("Failed to load {} ({}): {}", self.spec.package, err.kind(), err);
                Err(err)
            }
        }
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Whether a manifest publishes ES modules.
fn is_es_module(manifest: &Value) -> bool {
    if manifest.get("type").and_then(Value::as_str) == Some("module") {
        return true;
    }
    manifest.get("exports").is_some_and(has_import_condition)
}

fn has_import_condition(exports: &Value) -> bool {
    match exports {
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key == "import" || has_import_condition(value)),
        Value::Array(items) => items.iter().any(has_import_condition),
        _ => false,
    }
}
