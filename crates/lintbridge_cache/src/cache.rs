//! Least-recently-used store of lint results.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::key::CacheKey;

/// Number of entries kept by [`LintingCache::default`].
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded store of lint results, shared by all documents.
///
/// Lookups never block or suspend. The cache is not synchronized; callers
/// that share it across tasks must wrap it in a mutex.
pub struct LintingCache<V> {
    entries: LruCache<CacheKey, V>,
}

impl<V: Clone> LintingCache<V> {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns the value stored under `key` and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Stores `value` under `key`, evicting the least recently used entry
    /// when full.
    pub fn set(&mut self, key: CacheKey, value: V) {
        if let Some((evicted, _)) = self.entries.push(key, value)
            && self.entries.peek(&evicted).is_none()
        {
            debug!("Evicted cache entry {}", evicted);
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!("Clearing {} cache entries", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl<V: Clone> Default for LintingCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
