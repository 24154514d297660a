//! Cache Module
//!
//! Provides in-memory response caching with TTL expiration, LRU eviction,
//! tag invalidation, and stale-while-revalidate classification.

mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryOptions, Validator};
pub use key::cache_key;
pub use stats::CacheStats;
pub use store::{CacheLookup, CacheStore};
