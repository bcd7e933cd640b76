//! In-memory result cache with per-entry expiration
//!
//! Entries expire at an absolute instant fixed when they are stored. Expired
//! entries are dropped lazily on `get`, or in bulk by `evict_expired`, which
//! the service runs on a timer via [`ResultCache::spawn_sweeper`].
//!
//! Every operation is a single map access on a sharded map, so callers
//! share one cache across request handlers without any locking of their own.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Cached value plus its expiration instant
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe key → value cache with a fixed TTL
#[derive(Debug)]
pub struct ResultCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `value`, replacing any previous entry for `key`
    pub fn put(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Fetch a live value; an expired entry is removed and reported absent
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        // The shard guard must be released before remove_if takes it again
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
        };

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// True if `key` holds a live value
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Run `evict_expired` every `interval` until the handle is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.evict_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "Cache sweep");
                }
            }
        })
    }
}
