//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with TTL expiry, LRU eviction,
//! tag invalidation, and staleness classification.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::stats::CacheCounters;
use crate::cache::{CacheEntry, CacheStats, EntryOptions, Validator};

// == Cache Lookup ==
/// A live entry returned by [`CacheStore::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<V> {
    pub value: V,
    /// Past the soft cutoff but not expired
    pub is_stale: bool,
    /// Stale and flagged for stale-while-revalidate
    pub should_revalidate: bool,
    pub validator: Option<Validator>,
}

// == Cache Store ==
/// Bounded cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance counters
    counters: CacheCounters,
    /// Maximum number of entries allowed
    capacity: usize,
    /// TTL for entries set without one
    default_ttl: Duration,
    /// Monotonic access sequence for eviction tie-breaks
    next_seq: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            counters: CacheCounters::default(),
            capacity: capacity.max(1),
            default_ttl,
            next_seq: 0,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    // == Set ==
    /// Stores a value, replacing any entry at `key`.
    ///
    /// When a new key would exceed capacity, exactly one entry is evicted
    /// first. Returns the evicted key, if any.
    pub fn set(&mut self, key: impl Into<String>, value: V, options: EntryOptions) -> Option<String> {
        let key = key.into();

        let evicted = if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        let ttl = options.time_to_live.unwrap_or(self.default_ttl);
        let mut entry = CacheEntry::new(value, ttl, options);
        entry.access_seq = self.bump_seq();

        self.entries.insert(key, entry);
        self.counters.record_insertion();

        evicted
    }

    // == Get ==
    /// Retrieves a live entry and records the access.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<CacheLookup<V>> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.counters.record_expirations(1);
            self.counters.record_miss();
            debug!(key, "cache entry expired on read");
            return None;
        }

        let seq = self.bump_seq();
        let entry = self.entries.get_mut(key)?;
        entry.touch(seq);
        self.counters.record_hit();

        Some(CacheLookup {
            value: entry.value.clone(),
            is_stale: entry.is_stale(),
            should_revalidate: entry.should_revalidate(),
            validator: entry.validator.clone(),
        })
    }

    /// Whether a live entry exists, without touching it or the counters.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Delete ==
    /// Removes an entry by key.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.record_deletions(1);
        }
        removed
    }

    // == Delete By Tag ==
    /// Removes every entry carrying `tag`, returning how many were removed.
    pub fn delete_by_tag(&mut self, tag: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.has_tag(tag));
        let removed = before - self.entries.len();

        self.counters.record_deletions(removed);
        removed
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.counters.record_deletions(removed);
        removed
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();

        self.counters.record_expirations(removed);
        removed
    }

    // == Evict ==
    /// Removes the least recently accessed entry.
    ///
    /// Equal `last_accessed_at` values fall back to the access sequence, so
    /// the entry touched earliest goes first.
    fn evict_lru(&mut self) -> Option<String> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.recency())
            .map(|(key, _)| key.clone())?;

        self.entries.remove(&victim);
        self.counters.record_eviction();
        debug!(key = %victim, "evicted least recently used cache entry");
        Some(victim)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len(), self.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
