//! # TTL Cache
//! Bounded, time-windowed memoization placed in front of the market and news
//! fetchers.
//!
//! Entries expire a fixed window after insertion; a read past the window is a
//! miss and drops the entry. Once capacity is reached, the least recently used
//! entry is discarded.

use std::{
    borrow::Borrow,
    hash::Hash,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use cached::{Cached, TimedSizedCache};
use metrics::{counter, gauge};
use tracing::debug;

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Thread-safe cache with a fixed freshness window and entry bound.
pub struct TtlCache<K, V> {
    name: &'static str,
    inner: Mutex<TimedSizedCache<K, V>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `name` labels the exported metrics (`cache="market"` etc.).
    /// A capacity of 0 is treated as 1.
    pub fn new(name: &'static str, capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        gauge!("cache_ttl_seconds", "cache" => name).set(ttl.as_secs_f64());
        Self {
            name,
            inner: Mutex::new(TimedSizedCache::with_size_and_lifespan(capacity, ttl)),
            ttl,
            capacity,
        }
    }

    /// Fresh value for `key`, if any. A hit marks the entry as recently used;
    /// an expired entry is removed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let fresh = self.lock().cache_get(key).cloned();
        if fresh.is_some() {
            counter!("cache_hits_total", "cache" => self.name).increment(1);
        } else {
            counter!("cache_misses_total", "cache" => self.name).increment(1);
        }
        fresh
    }

    /// Store `value`, replacing any previous entry for `key` and restarting
    /// its window.
    pub fn insert(&self, key: K, value: V) {
        let mut cache = self.lock();
        let full = cache.cache_size() >= self.capacity;
        let replaced = cache.cache_set(key, value).is_some();
        if full && !replaced {
            debug!(cache = self.name, "evicted least recently used entry");
            counter!("cache_evictions_total", "cache" => self.name).increment(1);
        }
    }

    /// Number of stored entries, including ones not yet noticed as expired.
    pub fn len(&self) -> usize {
        self.lock().cache_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().cache_clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, TimedSizedCache<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
