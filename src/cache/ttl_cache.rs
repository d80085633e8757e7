use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::clock::{self, Clock};
use crate::error::LLMError;

pub const DEFAULT_CACHE_CAPACITY: usize = 500;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Capacity and uniform time-to-live for a [`TtlCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, LLMError> {
        let config = Self { capacity, ttl };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LLMError> {
        if self.capacity == 0 {
            return Err(LLMError::config("cache capacity must be greater than 0"));
        }
        if self.ttl.is_zero() {
            return Err(LLMError::config("cache ttl must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Entries dropped because their ttl ran out
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
    /// `hits / (hits + misses)`, 0 when there were no lookups
    pub hit_rate: f64,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    /// `None` when `inserted_at + ttl` is beyond what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Least-recently-used cache whose entries expire a fixed time after insertion.
///
/// Expiry is checked lazily on [`get`](Self::get); there is no sweeper thread. All
/// operations take one cache-wide lock for the duration of the bookkeeping only.
pub struct TtlCache<K: Hash + Eq, V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Creates an empty cache that reads time from the system clock.
    pub fn new(config: CacheConfig) -> Result<Self, LLMError> {
        Self::with_clock(config, clock::system())
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, LLMError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| LLMError::config("cache capacity must be greater than 0"))?;
        Ok(Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        })
    }

    /// Capacity and ttl this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns a clone of the live value for `key` and marks it most recently used.
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.entries.peek(key).map(|entry| entry.is_live(now)) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(false) => {
                inner.entries.pop(key);
                inner.expirations += 1;
                inner.misses += 1;
                return None;
            }
            Some(true) => {}
        }

        let value = inner.entries.get(key).map(|entry| entry.value.clone());
        inner.hits += 1;
        value
    }

    /// Inserts or overwrites `key`, marking it most recently used. When the cache is
    /// full, the least recently used entry is evicted.
    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now();
        let entry = Entry {
            value,
            inserted_at: now,
            expires_at: now.checked_add(self.config.ttl),
        };
        let mut inner = self.lock();
        let replaced_same_key = inner.entries.contains(&key);
        if inner.entries.push(key, entry).is_some() && !replaced_same_key {
            inner.evictions += 1;
            log::debug!("cache full, evicted least recently used entry");
        }
    }

    /// Removes `key`, returning its value whether or not it had expired.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().entries.pop(key).map(|entry| entry.value)
    }

    /// Presence check without touching recency or hit counters.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.lock()
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// When the live entry for `key` was inserted.
    pub fn inserted_at(&self, key: &K) -> Option<Instant> {
        let now = self.clock.now();
        self.lock()
            .entries
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.inserted_at)
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when nothing is stored, expired entries included.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Lookups that returned a live entry since creation or the last [`clear`](Self::clear).
    pub fn hits(&self) -> u64 {
        self.lock().hits
    }

    /// Lookups that found nothing or an expired entry.
    pub fn misses(&self) -> u64 {
        self.lock().misses
    }

    /// `hits / (hits + misses)` in `[0, 1]`; 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let inner = self.lock();
        hit_rate(inner.hits, inner.misses)
    }

    /// Point-in-time copy of every counter.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            size: inner.entries.len(),
            capacity: self.config.capacity,
            hit_rate: hit_rate(inner.hits, inner.misses),
        }
    }

    /// Drops every entry and zeroes the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        inner.expirations = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K: Hash + Eq, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64
}
