//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lintbridge_engine::PackageManager;

/// LintBridge - editor integration for an external Node.js linting engine
#[derive(Parser)]
#[command(name = "lintbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Package manager used to find a global engine install (npm, yarn, pnpm, bun)
    #[arg(long, global = true, value_name = "MANAGER")]
    pub package_manager: Option<PackageManager>,

    /// npm package name of the engine
    #[arg(long, global = true, value_name = "PACKAGE")]
    pub engine_package: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the LSP server on stdin/stdout
    Lsp,

    /// Try to load the engine once and report what was found
    Doctor {
        /// Project directory to check (defaults to the current directory)
        cwd: Option<PathBuf>,
    },
}
