use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lintbridge_resolver::{
    CommandOutput, CommandRunner, ModuleResolver, PackageManager, PackageManagerLocator,
    ResolutionOrigin, TraceLog,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

/// Reports a fixed global root for every `root -g` query.
struct FixedRoot(String);

#[async_trait]
impl CommandRunner for FixedRoot {
    async fn run(&self, _program: &str, args: &[&str]) -> Result<CommandOutput, String> {
        if args == ["root", "-g"] {
            Ok(CommandOutput {
                success: true,
                stdout: format!("{}\n", self.0),
                stderr: String::new(),
            })
        } else {
            Err("unsupported".to_string())
        }
    }
}

fn write_engine(node_modules: &Path) {
    let pkg = node_modules.join("@lintbridge").join("engine");
    fs::create_dir_all(pkg.join("dist").join("rules")).unwrap();
    fs::write(
        pkg.join("package.json"),
        r#"{
            "name": "@lintbridge/engine",
            "version": "1.2.0",
            "type": "module",
            "exports": {
                ".": "./dist/index.js",
                "./linter": { "import": "./dist/linter.js" },
                "./cli": "./dist/cli.js",
                "./rules/*": "./dist/rules/*.js"
            }
        }"#,
    )
    .unwrap();
    for file in ["index.js", "linter.js", "cli.js", "rules/no-tabs.js"] {
        fs::write(pkg.join("dist").join(file), "export {};").unwrap();
    }
}

fn resolver_with_global(root: &Path) -> ModuleResolver {
    let runner = Arc::new(FixedRoot(root.display().to_string()));
    ModuleResolver::new(Arc::new(
        PackageManagerLocator::with_runner(runner).with_home(None),
    ))
}

#[tokio::test]
async fn resolves_exports_locally() {
    let project = tempdir().unwrap();
    write_engine(&project.path().join("node_modules"));
    let cwd = project.path().join("src");
    fs::create_dir_all(&cwd).unwrap();
    let empty_global = tempdir().unwrap();
    let resolver = resolver_with_global(empty_global.path());
    let trace = TraceLog::new();

    let main = resolver
        .resolve(&cwd, "@lintbridge/engine", PackageManager::Npm, &trace)
        .await
        .unwrap();
    let rule = resolver
        .resolve(
            &cwd,
            "@lintbridge/engine/rules/no-tabs",
            PackageManager::Npm,
            &trace,
        )
        .await
        .unwrap();

    assert_eq!(main.origin, ResolutionOrigin::Local);
    assert!(main.path.ends_with("dist/index.js"));
    assert!(rule.path.ends_with("dist/rules/no-tabs.js"));
}

#[tokio::test]
async fn unexported_subpath_is_absent() {
    let project = tempdir().unwrap();
    write_engine(&project.path().join("node_modules"));
    let empty_global = tempdir().unwrap();
    let resolver = resolver_with_global(empty_global.path());
    let trace = TraceLog::new();

    let found = resolver
        .resolve(
            project.path(),
            "@lintbridge/engine/dist/index.js",
            PackageManager::Npm,
            &trace,
        )
        .await;

    assert_eq!(found, None);
    assert!(
        trace
            .messages()
            .iter()
            .any(|m| m.contains("does not export"))
    );
}

#[tokio::test]
async fn export_target_outside_package_is_rejected() {
    let project = tempdir().unwrap();
    let pkg = project.path().join("node_modules").join("engine");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(
        pkg.join("package.json"),
        r#"{ "name": "engine", "exports": { "./linter": "./../../outside.js" } }"#,
    )
    .unwrap();
    fs::write(project.path().join("outside.js"), "export {};").unwrap();
    let empty_global = tempdir().unwrap();
    let resolver = resolver_with_global(empty_global.path());
    let trace = TraceLog::new();

    let found = resolver
        .resolve(project.path(), "engine/linter", PackageManager::Npm, &trace)
        .await;

    assert_eq!(found, None);
}

#[tokio::test]
async fn falls_back_to_global_root() {
    let project = tempdir().unwrap();
    let global = tempdir().unwrap();
    write_engine(global.path());
    let resolver = resolver_with_global(global.path());
    let trace = TraceLog::new();

    let linter = resolver
        .resolve(
            project.path(),
            "@lintbridge/engine/linter",
            PackageManager::Pnpm,
            &trace,
        )
        .await
        .unwrap();

    assert_eq!(linter.origin, ResolutionOrigin::Global(PackageManager::Pnpm));
    assert!(linter.path.ends_with("dist/linter.js"));
}

#[tokio::test]
async fn finds_manifest_ignoring_exports() {
    let project = tempdir().unwrap();
    write_engine(&project.path().join("node_modules"));
    let empty_global = tempdir().unwrap();
    let resolver = resolver_with_global(empty_global.path());
    let trace = TraceLog::new();

    let manifest = resolver
        .find_package_manifest(
            project.path(),
            "@lintbridge/engine",
            PackageManager::Npm,
            &trace,
        )
        .await
        .unwrap();

    assert_eq!(manifest.origin, ResolutionOrigin::Local);
    assert!(manifest.path.ends_with("engine/package.json"));
}

#[tokio::test]
async fn not_installed_anywhere() {
    let project = tempdir().unwrap();
    let empty_global = tempdir().unwrap();
    let resolver = resolver_with_global(empty_global.path());
    let trace = TraceLog::new();

    let found = resolver
        .resolve(project.path(), "@lintbridge/engine", PackageManager::Npm, &trace)
        .await;

    assert_eq!(found, None);
    assert!(trace.messages().len() >= 2);
}
