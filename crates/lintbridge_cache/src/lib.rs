//! # lintbridge_cache
//!
//! In-memory cache of lint results keyed by document, engine version,
//! document revision and configuration hash.

mod cache;
mod key;

pub use cache::{DEFAULT_CAPACITY, LintingCache};
pub use key::CacheKey;
