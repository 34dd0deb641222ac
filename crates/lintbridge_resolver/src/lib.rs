//! # lintbridge_resolver
//!
//! Locates the external linting engine on disk.
//!
//! This crate provides:
//! - [`PackageManager`] identities and lockfile-based detection
//! - [`PackageManagerLocator`], which asks a package manager where its
//!   global packages live
//! - [`ModuleResolver`], which performs Node-style resolution (honouring
//!   `package.json` `exports`) locally and then in the global directory
//!
//! Nothing in this crate returns an error: absence is the failure signal and
//! the details of every attempt go to a [`TraceSink`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use lintbridge_resolver::{ModuleResolver, PackageManager, TraceLog};
//!
//! let resolver = ModuleResolver::system();
//! let trace = TraceLog::new();
//! if let Some(found) = resolver
//!     .resolve(cwd, "@lintbridge/engine", PackageManager::Npm, &trace)
//!     .await
//! {
//!     println!("{} ({})", found.path.display(), found.origin);
//! }
//! ```

mod exports;
mod locator;
mod manager;
mod resolver;
mod trace;

pub use exports::{CONDITIONS, resolve_exports};
pub use locator::{CommandOutput, CommandRunner, PackageManagerLocator, SystemCommandRunner};
pub use manager::{PackageManager, detect_package_manager};
pub use resolver::{ModuleResolver, PackageRequest, ResolutionOrigin, ResolvedPath};
pub use trace::{TraceLog, TraceSink};
