//! Expiring in-memory store.
//!
//! Entries are written with `now + ttl` and are invisible once that instant has
//! passed. Stale entries are never evicted on their own; the next insert for the
//! same key overwrites them.

use std::{collections::HashMap, hash::Hash, sync::RwLock, time::Duration};

use metrics::counter;
use tokio::time::Instant;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
pub const METRIC_CACHE_HIT: &str = "vicky_posts_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "vicky_posts_cache_miss_total";

/// Stored value plus the instant after which it must not be served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Map of keys to expiring values behind a single read/write lock.
pub struct TtlStore<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty store. `name` labels the hit/miss counters.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the value for `key` if it has not expired. Counts a hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.fresh(key, "get");
        match found {
            Some(_) => counter!(METRIC_CACHE_HIT, "cache" => self.name).increment(1),
            None => counter!(METRIC_CACHE_MISS, "cache" => self.name).increment(1),
        }
        found
    }

    /// Same freshness check as [`TtlStore::get`] without touching the counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.fresh(key, "peek")
    }

    fn fresh(&self, key: &K, op: &'static str) -> Option<V> {
        let now = Instant::now();
        rw_read(&self.entries, SOURCE, op)
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key`, returning the new expiration instant.
    pub fn insert(&self, key: K, value: V) -> Instant {
        let expires_at = Instant::now() + self.ttl;
        rw_write(&self.entries, SOURCE, "insert").insert(key, CacheEntry { value, expires_at });
        expires_at
    }

    /// Expiration instant of the stored entry, fresh or not.
    pub fn expires_at(&self, key: &K) -> Option<Instant> {
        rw_read(&self.entries, SOURCE, "expires_at")
            .get(key)
            .map(|entry| entry.expires_at)
    }

    /// Number of stored entries, including expired ones awaiting overwrite.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
