//! LintBridge CLI
//!
//! Runs the LintBridge language server and checks engine installations.

mod cli;
mod commands;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use lintbridge_engine::EngineSpec;
use lintbridge_lsp::ServerOptions;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::doctor::run_doctor;
use commands::lsp::run_lsp;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging. stdout carries the LSP channel, so logs go to stderr.
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn server_options(cli: &Cli) -> ServerOptions {
    let spec = match &cli.engine_package {
        Some(package) => EngineSpec::new(package.clone()),
        None => EngineSpec::default(),
    };
    ServerOptions {
        spec,
        package_manager: cli.package_manager,
    }
}

fn run(cli: Cli) -> Result<bool> {
    let options = server_options(&cli);
    match &cli.command {
        Commands::Lsp => run_lsp(options).map(|_| false),
        Commands::Doctor { cwd } => run_doctor(cwd.as_deref(), options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintbridge_engine::PackageManager;

    #[test]
    fn test_server_options_from_flags() {
        let cli = Cli::parse_from([
            "lintbridge",
            "--package-manager",
            "pnpm",
            "--engine-package",
            "@acme/engine",
            "lsp",
        ]);
        let options = server_options(&cli);

        assert_eq!(options.spec.package, "@acme/engine");
        assert_eq!(options.package_manager, Some(PackageManager::Pnpm));
    }

    #[test]
    fn test_server_options_defaults() {
        let cli = Cli::parse_from(["lintbridge", "doctor"]);
        let options = server_options(&cli);

        assert_eq!(options.spec.package, "@lintbridge/engine");
        assert_eq!(options.package_manager, None);
        assert!(matches!(cli.command, Commands::Doctor { cwd: None }));
    }
}
