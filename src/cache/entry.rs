//! Cache Entry Module
//!
//! Defines a single cached value with freshness and access metadata.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

// == Validator ==
/// Conditional-request tokens captured from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    /// `ETag` header value
    pub etag: Option<String>,
    /// `Last-Modified` header value
    pub last_modified: Option<String>,
}

impl Validator {
    /// Returns None when neither token is present.
    pub fn from_parts(etag: Option<String>, last_modified: Option<String>) -> Option<Self> {
        if etag.is_none() && last_modified.is_none() {
            None
        } else {
            Some(Self {
                etag,
                last_modified,
            })
        }
    }
}

// == Entry Options ==
/// Freshness and grouping settings for a `set` call.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    /// Hard cutoff; the store default applies when None
    pub time_to_live: Option<Duration>,
    /// Soft cutoff after which the entry is stale
    pub max_age: Option<Duration>,
    /// Labels for group invalidation
    pub tags: HashSet<String>,
    /// Conditional-request tokens
    pub validator: Option<Validator>,
    /// Serve stale-but-unexpired values while a refresh runs
    pub allow_stale_serve: bool,
}

impl EntryOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_validator(mut self, validator: Option<Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn stale_while_revalidate(mut self, allow: bool) -> Self {
        self.allow_stale_serve = allow;
        self
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation instant
    pub created_at: Instant,
    /// Age after which the entry is expired
    pub time_to_live: Duration,
    /// Age after which the entry is stale, None = same as TTL
    pub max_age: Option<Duration>,
    /// Labels for group invalidation
    pub tags: HashSet<String>,
    /// Conditional-request tokens
    pub validator: Option<Validator>,
    /// Whether a stale value may be served during refresh
    pub allow_stale_serve: bool,
    /// Number of reads served
    pub access_count: u64,
    /// Instant of the last insert or read
    pub last_accessed_at: Instant,
    /// Store-wide access sequence, breaks `last_accessed_at` ties
    pub(crate) access_seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current instant.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `time_to_live` - Hard expiry
    /// * `options` - Remaining freshness settings (its TTL field is ignored)
    pub fn new(value: V, time_to_live: Duration, options: EntryOptions) -> Self {
        let now = Instant::now();

        Self {
            value,
            created_at: now,
            time_to_live,
            max_age: options.max_age,
            tags: options.tags,
            validator: options.validator,
            allow_stale_serve: options.allow_stale_serve,
            access_count: 0,
            last_accessed_at: now,
            access_seq: 0,
        }
    }

    /// Time elapsed since creation.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once its age is strictly greater than its TTL.
    pub fn is_expired(&self) -> bool {
        self.age() > self.time_to_live
    }

    // == Is Stale ==
    /// Checks if the entry has passed its soft cutoff.
    ///
    /// Falls back to the TTL when no max age is set, so an entry without one
    /// is never observed stale.
    pub fn is_stale(&self) -> bool {
        self.age() > self.max_age.unwrap_or(self.time_to_live)
    }

    /// True when a stale value may be served while a refresh runs.
    pub fn should_revalidate(&self) -> bool {
        self.allow_stale_serve && self.is_stale()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    // == Touch ==
    /// Records a read.
    pub(crate) fn touch(&mut self, seq: u64) {
        self.access_count += 1;
        self.last_accessed_at = Instant::now();
        self.access_seq = seq;
    }

    /// Remaining time before expiry, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.time_to_live.saturating_sub(self.age())
    }

    /// Eviction ordering key: oldest access first.
    pub(crate) fn recency(&self) -> (Instant, u64) {
        (self.last_accessed_at, self.access_seq)
    }
}
