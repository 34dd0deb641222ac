//! # lintbridge_engine
//!
//! Loading and driving the external linting engine.
//!
//! This crate provides:
//! - The engine capability contracts ([`LinterSurface`], [`CliSurface`])
//! - [`LoadedEngine`], a version-checked engine handle with its own rule cache
//! - [`NodeEngineProvider`], which locates, imports and gates the engine
//! - The Node.js bridge used to call into the engine from Rust
//!
//! ## Example
//!
//! ```rust,ignore
//! use lintbridge_engine::{EngineProvider, EngineSpec, NodeEngineProvider};
//!
//! let provider = NodeEngineProvider::system(EngineSpec::default());
//! match provider.try_load(workspace_root).await {
//!     Ok(engine) => println!("engine {} at {}", engine.version(), engine.module_path().display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

mod bridge;
mod config;
mod engine;
mod error;
mod loader;
mod provider;
mod rule_loader;
mod surface;

pub use bridge::{NodeCli, NodeImporter, NodeLinter, NodeRuntime};
pub use config::{CONFIG_FILES, EngineConfig, EngineSpec, IGNORE_FILES};
pub use engine::LoadedEngine;
pub use error::{BridgeError, EngineError, ImportError, LoadError, RuleLoadError};
pub use loader::NodeEngineProvider;
pub use provider::{EngineModule, EngineProvider, ModuleImporter};
pub use rule_loader::{RuleLoader, RuleModule};
pub use surface::{
    CliSurface, FixCommand, LintMetadata, LintOptions, LintOutput, LinterSurface, Problem,
    RuleDocs, RuleMeta, Severity, Suggestion,
};

pub use lintbridge_resolver::PackageManager;
