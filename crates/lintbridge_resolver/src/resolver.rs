//! Node-style module resolution.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::exports::resolve_exports;
use crate::locator::PackageManagerLocator;
use crate::manager::PackageManager;
use crate::trace::TraceSink;

/// Extensions probed for extensionless files, in order.
const EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

/// How a module path was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOrigin {
    /// Found in a `node_modules` directory above the working directory.
    Local,
    /// Found in the global directory of the given package manager.
    Global(PackageManager),
}

impl fmt::Display for ResolutionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionOrigin::Local => f.write_str("local"),
            ResolutionOrigin::Global(manager) => write!(f, "global ({manager})"),
        }
    }
}

/// An absolute module path plus how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub origin: ResolutionOrigin,
}

/// A bare module request split into package name and subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// Package name, including the scope (`@scope/name`).
    pub name: String,
    /// `"."` for the package itself, otherwise `"./sub/path"`.
    pub subpath: String,
}

impl PackageRequest {
    /// Parses `name`, `name/sub`, `@scope/name` or `@scope/name/sub`.
    pub fn parse(request: &str) -> Option<Self> {
        if request.is_empty() || request.starts_with('.') || request.starts_with('/') {
            return None;
        }

        let mut parts = request.splitn(if request.starts_with('@') { 3 } else { 2 }, '/');
        let name = if request.starts_with('@') {
            let scope = parts.next()?;
            let pkg = parts.next().filter(|p| !p.is_empty())?;
            format!("{scope}/{pkg}")
        } else {
            parts.next()?.to_string()
        };

        let subpath = match parts.next() {
            Some(rest) if !rest.is_empty() => format!("./{rest}"),
            _ => ".".to_string(),
        };

        if Path::new(&subpath)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }

        Some(Self { name, subpath })
    }
}

/// Resolves package entry points locally, then globally.
pub struct ModuleResolver {
    locator: Arc<PackageManagerLocator>,
}

impl ModuleResolver {
    /// Creates a resolver that uses the given locator for global lookups.
    pub fn new(locator: Arc<PackageManagerLocator>) -> Self {
        Self { locator }
    }

    /// Creates a resolver backed by real package-manager processes.
    pub fn system() -> Self {
        Self::new(Arc::new(PackageManagerLocator::system()))
    }

    /// The locator used for global lookups.
    pub fn locator(&self) -> &PackageManagerLocator {
        &self.locator
    }

    /// Resolves `request` (e.g. `@scope/engine/linter`) to an absolute file.
    ///
    /// Local `node_modules` directories above `cwd` are tried first, then the
    /// global directory of `manager`.
    pub async fn resolve(
        &self,
        cwd: &Path,
        request: &str,
        manager: PackageManager,
        trace: &dyn TraceSink,
    ) -> Option<ResolvedPath> {
        let Some(parsed) = PackageRequest::parse(request) else {
            trace.trace(&format!("'{request}' is not a package request"));
            return None;
        };

        if let Some(path) = resolve_local(cwd, &parsed, trace) {
            trace.trace(&format!("Resolved '{request}' locally to {}", path.display()));
            return Some(ResolvedPath {
                path,
                origin: ResolutionOrigin::Local,
            });
        }
        trace.trace(&format!(
            "'{request}' is not resolvable from {}",
            cwd.display()
        ));

        let global_root = self.locator.locate_global_root(manager, trace).await?;

        trace.trace(&format!(
            "Resolving '{request}' in {} on behalf of {}",
            global_root.display(),
            cwd.display()
        ));
        match resolve_in(&global_root, &parsed, trace) {
            Some(path) => {
                trace.trace(&format!(
                    "Resolved '{request}' globally ({manager}) to {}",
                    path.display()
                ));
                Some(ResolvedPath {
                    path,
                    origin: ResolutionOrigin::Global(manager),
                })
            }
            None => {
                trace.trace(&format!(
                    "'{request}' is not installed globally with {manager}"
                ));
                None
            }
        }
    }

    /// Finds the `package.json` of `package` without consulting `exports`.
    ///
    /// Looks in `node_modules` directories above `cwd`, then in the global
    /// directory of `manager`.
    pub async fn find_package_manifest(
        &self,
        cwd: &Path,
        package: &str,
        manager: PackageManager,
        trace: &dyn TraceSink,
    ) -> Option<ResolvedPath> {
        if let Some(dir) = find_package_root(cwd, package) {
            return Some(ResolvedPath {
                path: dir.join("package.json"),
                origin: ResolutionOrigin::Local,
            });
        }
        trace.trace(&format!(
            "No {package}/package.json in node_modules above {}",
            cwd.display()
        ));

        let global_root = self.locator.locate_global_root(manager, trace).await?;
        let manifest = global_root.join(package).join("package.json");
        if manifest.is_file() {
            Some(ResolvedPath {
                path: manifest,
                origin: ResolutionOrigin::Global(manager),
            })
        } else {
            trace.trace(&format!("No {}", manifest.display()));
            None
        }
    }
}

/// Walks up from `start` looking for `node_modules/<package>/package.json`.
pub(crate) fn find_package_root(start: &Path, package: &str) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join("node_modules").join(package);
        candidate.join("package.json").is_file().then_some(candidate)
    })
}

fn resolve_local(cwd: &Path, request: &PackageRequest, trace: &dyn TraceSink) -> Option<PathBuf> {
    cwd.ancestors()
        .map(|dir| dir.join("node_modules"))
        .find(|nm| nm.join(&request.name).is_dir())
        .and_then(|nm| resolve_in(&nm, request, trace))
}

/// Resolves `request` inside one `node_modules` directory.
fn resolve_in(
    node_modules: &Path,
    request: &PackageRequest,
    trace: &dyn TraceSink,
) -> Option<PathBuf> {
    let package_dir = node_modules.join(&request.name);
    let manifest_path = package_dir.join("package.json");

    let manifest: Option<Value> = fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok());

    if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports")) {
        let Some(target) = resolve_exports(exports, &request.subpath) else {
            trace.trace(&format!(
                "{} does not export '{}'",
                manifest_path.display(),
                request.subpath
            ));
            return None;
        };
        let path = package_dir.join(target.trim_start_matches("./"));
        return path.is_file().then(|| absolute(path));
    }

    if !package_dir.is_dir() {
        return None;
    }

    let resolved = if request.subpath == "." {
        let main = manifest
            .as_ref()
            .and_then(|m| m.get("main"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty());
        match main {
            Some(main) => probe_file(&package_dir.join(main)),
            None => probe_file(&package_dir.join("index")),
        }
    } else {
        probe_file(&package_dir.join(request.subpath.trim_start_matches("./")))
    };

    if resolved.is_none() {
        trace.trace(&format!(
            "No file for '{}' in {}",
            request.subpath,
            package_dir.display()
        ));
    }
    resolved.map(absolute)
}

/// Applies Node's file and directory probing to `base`.
fn probe_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    for ext in EXTENSIONS {
        let mut with_ext = base.as_os_str().to_owned();
        with_ext.push(".");
        with_ext.push(ext);
        let candidate = PathBuf::from(with_ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if base.is_dir() {
        return EXTENSIONS
            .iter()
            .map(|ext| base.join(format!("index.{ext}")))
            .find(|p| p.is_file());
    }
    None
}

fn absolute(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}
