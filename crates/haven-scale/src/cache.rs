//! TTL + LRU hot cache.
//!
//! In-process advisory cache in front of the store: LRU-ordered,
//! size-bounded, with a per-entry TTL and hit/miss counters. Writers
//! MUST invalidate the key prefix that corresponds to what they wrote;
//! the store remains the system of record.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;

/// Default maximum number of entries.
const DEFAULT_MAX_SIZE: usize = 5000;

/// Default entry time-to-live.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry {
    value: serde_json::Value,
    inserted_at: Instant,
}

struct Inner {
    entries: LruCache<String, Entry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics for the scaling surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live entry count.
    pub size: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// Lookup hits since startup.
    pub hits: u64,
    /// Lookup misses since startup.
    pub misses: u64,
    /// hits / (hits + misses), 0.0 when untouched.
    pub hit_rate: f64,
}

/// Concurrent-safe TTL + LRU cache of JSON values.
pub struct TtlCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_size: usize,
}

impl TtlCache {
    /// Create a cache with the default capacity (5000) and TTL (300 s).
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }

    /// Create a cache with explicit capacity and TTL.
    pub fn with_limits(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            ttl,
            max_size: capacity.get(),
        }
    }

    /// Look a key up, counting a hit or a miss. Expired entries are
    /// evicted and count as misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                let value = entry.value.clone();
                inner.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
        }
        inner.misses += 1;
        None
    }

    /// Insert or refresh a key. Eviction of the least-recently-used
    /// entry happens automatically at capacity.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.put(
                key.into(),
                Entry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many
    /// entries were invalidated.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.entries.pop(key);
        }
        keys.len()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let Ok(inner) = self.inner.lock() else {
            return CacheStats {
                size: 0,
                max_size: self.max_size,
                hits: 0,
                misses: 0,
                hit_rate: 0.0,
            };
        };
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn get_set_and_counters() {
        let cache = TtlCache::new();
        assert!(cache.get("agent:vera:status").is_none());
        cache.set("agent:vera:status", serde_json::json!({"mood": "Calm"}));
        assert!(cache.get("agent:vera:status").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.max_size, 5000);
    }

    #[test]
    fn ttl_expiry_counts_as_miss() {
        let cache = TtlCache::with_limits(10, Duration::ZERO);
        cache.set("k", serde_json::json!(1));
        // TTL of zero: the entry is already expired.
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = TtlCache::with_limits(2, Duration::from_secs(60));
        cache.set("a", serde_json::json!(1));
        cache.set("b", serde_json::json!(2));
        // Touch "a" so "b" is the least recently used.
        cache.get("a");
        cache.set("c", serde_json::json!(3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn prefix_invalidation() {
        let cache = TtlCache::new();
        cache.set("agent:vera:status", serde_json::json!(1));
        cache.set("agent:vera:memories", serde_json::json!(2));
        cache.set("agent:garrick:status", serde_json::json!(3));

        let dropped = cache.invalidate_prefix("agent:vera:");
        assert_eq!(dropped, 2);
        assert!(cache.get("agent:vera:status").is_none());
        assert!(cache.get("agent:garrick:status").is_some());
    }
}
