//! LRU cache for IRC metadata outcomes.
//!
//! Generic in-memory cache with a fixed capacity and least-recently-used eviction.

mod cache;

pub use cache::{CacheStats, MetadataCache};
