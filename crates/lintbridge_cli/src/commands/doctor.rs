//! Doctor command implementation

use std::path::{Path, PathBuf};

use lintbridge_engine::{EngineProvider, LoadError, LoadedEngine, NodeEngineProvider};
use lintbridge_lsp::ServerOptions;
use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::utils::create_tokio_runtime;

/// Loads the engine for `cwd` once and prints the outcome.
///
/// Returns `true` when the engine could not be loaded.
pub fn run_doctor(cwd: Option<&Path>, options: ServerOptions) -> Result<bool> {
    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().into_diagnostic()?,
    };
    let cwd: PathBuf = cwd.canonicalize().into_diagnostic()?;
    debug!("Checking engine for {}", cwd.display());

    let provider =
        NodeEngineProvider::system(options.spec).with_package_manager(options.package_manager);
    let result = create_tokio_runtime()?.block_on(provider.try_load(&cwd));

    match result {
        Ok(engine) => {
            print_engine(&engine);
            Ok(false)
        }
        Err(err) => {
            print_failure(&err);
            Ok(true)
        }
    }
}

fn print_engine(engine: &LoadedEngine) {
    println!("engine:  {}", engine.version());
    println!("path:    {}", engine.module_path().display());
    println!("presets: {}", engine.presets_root().display());
    println!("manager: {}", engine.rule_loader().package_manager());
}

fn print_failure(err: &LoadError) {
    println!("error[{}]: {}", err.kind(), err);
    let trace = err.trace();
    if !trace.is_empty() {
        println!();
        println!("resolution trace:");
        for line in trace {
            println!("  {line}");
        }
    }
}
