//! Caching for enumerated paths.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;

use crate::engine::pathfinder::Path;

/// Cache key for a path search. The graph is immutable, so no block or TTL is involved.
#[derive(Hash, PartialEq, Eq, Clone, Debug)]
pub struct PathCacheKey {
    pub source: String,
    pub destination: String,
    pub allow_multihop: bool,
    pub max_hops: usize,
}

impl PathCacheKey {
    pub fn new(source: &str, destination: &str, allow_multihop: bool, max_hops: usize) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            allow_multihop,
            max_hops,
        }
    }
}

/// Snapshot of cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub path_hits: usize,
    pub path_misses: usize,
}

/// LRU cache of enumerated path lists.
pub struct PathCache {
    paths: LruCache<PathCacheKey, Vec<Path>>,
    path_hits: AtomicUsize,
    path_misses: AtomicUsize,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            paths: LruCache::new(capacity),
            path_hits: AtomicUsize::new(0),
            path_misses: AtomicUsize::new(0),
        }
    }

    /// Get cached paths, counting the lookup as a hit or miss.
    pub fn get(&mut self, key: &PathCacheKey) -> Option<&Vec<Path>> {
        match self.paths.get(key) {
            Some(paths) => {
                self.path_hits.fetch_add(1, Ordering::Relaxed);
                Some(paths)
            }
            None => {
                self.path_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&mut self, key: PathCacheKey, paths: Vec<Path>) {
        self.paths.put(key, paths);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Retrieve current cache metrics snapshot.
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            path_hits: self.path_hits.load(Ordering::Relaxed),
            path_misses: self.path_misses.load(Ordering::Relaxed),
        }
    }
}
