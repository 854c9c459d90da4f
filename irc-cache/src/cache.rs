//! In-memory LRU cache keyed by opaque identifiers.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

/// Fixed-capacity cache with least-recently-used eviction.
///
/// Thread-safe. Every read hit marks the entry as most recently used, so
/// reads take the same lock as writes. Eviction happens inline on insert
/// and has no side effects.
pub struct MetadataCache<K, V> {
    entries: Mutex<LruCache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> MetadataCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Gets a copy of the cached value and refreshes its recency.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.entries.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Evicts the least recently used entry when the cache is full.
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        // `push` also hands back the old value when `key` was already present.
        let replacing = entries.contains(&key);
        if entries.push(key, value).is_some() && !replacing {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries currently cached
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
}
