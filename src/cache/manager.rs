//! Bounded, time-expiring response cache.

use super::key::{Fingerprint, RequestDescriptor};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(rename = "ttl_ms", with = "crate::config::duration_ms")]
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(30),
            capacity: 100,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// A stored successful result. Entries are replaced, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: Fingerprint,
    pub payload: T,
    pub created_at: Instant,
    /// The request that produced this payload.
    pub context: RequestDescriptor,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<T> {
    // Only `peek`/`push`/`pop` are used, so LRU order is insertion order.
    entries: LruCache<Fingerprint, CacheEntry<T>>,
    stats: CacheStats,
}

/// Capacity-bounded store of prior successful results.
///
/// - `get` purges and misses on entries older than the TTL (lazy expiry)
/// - `put` evicts the oldest-inserted entry when full; reads never refresh order
/// - all operations are O(1)
pub struct ResponseCache<T> {
    ttl: Duration,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> ResponseCache<T> {
    /// A capacity of zero is clamped to one; `GuardConfig::validate` rejects it earlier.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl: config.ttl,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    pub fn get(&self, key: &Fingerprint) -> Option<T> {
        self.entry(key).map(|e| e.payload)
    }

    /// Full entry for `key`, including the descriptor that produced it.
    pub fn entry(&self, key: &Fingerprint) -> Option<CacheEntry<T>> {
        let now = Instant::now();
        let mut inner = self.lock();
        let expired = match inner.entries.peek(key) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.age(now) > self.ttl,
        };
        if expired {
            inner.entries.pop(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            return None;
        }
        inner.stats.hits += 1;
        inner.entries.peek(key).cloned()
    }

    /// Insert or overwrite. Returns the key evicted to make room, if any.
    pub fn put(&self, key: Fingerprint, payload: T, context: RequestDescriptor) -> Option<Fingerprint> {
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            created_at: Instant::now(),
            context,
        };
        let mut inner = self.lock();
        inner.stats.inserts += 1;
        match inner.entries.push(key.clone(), entry) {
            Some((old, _)) if old != key => {
                inner.stats.evictions += 1;
                Some(old)
            }
            _ => None,
        }
    }

    pub fn remove(&self, key: &Fingerprint) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    /// Drop every entry and reset the statistics.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }

    /// Number of stored entries, including ones that expired but were not read yet.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn cache(capacity: usize, ttl_ms: u64) -> ResponseCache<Value> {
        ResponseCache::new(
            &CacheConfig::new()
                .with_capacity(capacity)
                .with_ttl(Duration::from_millis(ttl_ms)),
        )
    }

    fn key(s: &str) -> Fingerprint {
        Fingerprint::from(s)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let cache = cache(10, 30_000);
        cache.put(key("k"), json!({"text": "ok"}), RequestDescriptor::new("eggs"));

        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get(&key("k")), Some(json!({"text": "ok"})));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get(&key("k")), None);
        // purged on read
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_inserted_not_least_accessed() {
        let cache = cache(2, 60_000);
        cache.put(key("a"), json!(1), RequestDescriptor::new("a"));
        cache.put(key("b"), json!(2), RequestDescriptor::new("b"));

        // Reading "a" must not protect it from eviction.
        assert!(cache.get(&key("a")).is_some());

        let evicted = cache.put(key("c"), json!(3), RequestDescriptor::new("c"));
        assert_eq!(evicted, Some(key("a")));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("b")).is_some());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let cache = cache(2, 60_000);
        cache.put(key("a"), json!(1), RequestDescriptor::new("a"));
        cache.put(key("b"), json!(2), RequestDescriptor::new("b"));
        assert_eq!(cache.put(key("a"), json!(10), RequestDescriptor::new("a")), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("a")), Some(json!(10)));

        // "a" was re-inserted, so "b" is now the oldest.
        assert_eq!(cache.put(key("c"), json!(3), RequestDescriptor::new("c")), Some(key("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_is_hard_ceiling() {
        let cache = cache(5, 60_000);
        for i in 0..50 {
            cache.put(key(&i.to_string()), json!(i), RequestDescriptor::new(i.to_string()));
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.stats().evictions, 45);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_keeps_context_and_clear_resets() {
        let cache = cache(3, 60_000);
        let desc = RequestDescriptor::new("eggs").with_model("m1");
        cache.put(key("k"), json!("x"), desc.clone());
        let entry = cache.entry(&key("k")).unwrap();
        assert_eq!(entry.context, desc);
        assert_eq!(entry.key, key("k"));

        assert!(cache.get(&key("missing")).is_none());
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
