//! Page cache
//!
//! Keeps fetched application pages in memory for a bounded time so a retry
//! of the same posting does not fetch the form again. Entries expire after a
//! fixed TTL and the cache never holds more than `capacity` pages.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

/// TTL cache of page content keyed by URL
///
/// Clones share the same entries.
#[derive(Clone)]
pub struct PageCache {
    /// moka cache (LRU + TTL)
    cache: Cache<String, String>,
    ttl: Duration,
    capacity: u64,
}

impl PageCache {
    /// Creates an empty cache
    ///
    /// A `capacity` of zero is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = u64::try_from(capacity.max(1)).unwrap_or(u64::MAX);
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|url, _content, cause| {
                tracing::trace!("Evicted cached page {} (cause: {:?})", url, cause);
            })
            .build();

        Self {
            cache,
            ttl,
            capacity,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the cached page for `url` if it has not expired
    pub fn get(&self, url: &str) -> Option<String> {
        self.cache.get(url)
    }

    /// Stores `content` for `url`, replacing any previous entry
    pub fn insert(&self, url: impl Into<String>, content: impl Into<String>) {
        self.cache.insert(url.into(), content.into());
    }

    /// Applies pending expirations and evictions, returning how many entries
    /// were dropped
    pub fn purge_expired(&self) -> u64 {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks();
        before.saturating_sub(self.cache.entry_count())
    }

    /// Number of live entries
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
