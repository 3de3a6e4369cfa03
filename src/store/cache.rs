//! Write-through LRU+TTL cache.
//!
//! Grounded on
//! `original_source/app/Database/repository/cache.py`'s `LRUCache`: an
//! ordered map guarded by a single lock, with hit/miss counters and
//! substring-pattern invalidation. Ported directly rather than pulled from
//! an ecosystem crate — no example in the retrieval pack depends on one,
//! and the original's exact eviction/TTL/stats shape is what `SignalStore`
//! needs to reproduce (see DESIGN.md).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Entry {
    value: String,
    expires_at: Instant,
    order: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    max_size: usize,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
    next_order: u64,
}

/// Thread-safe LRU cache with per-entry TTL. Values are stored as JSON
/// text; callers serialize/deserialize at the edges.
pub struct LruCache {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl LruCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                max_size,
                default_ttl,
                hits: 0,
                misses: 0,
                next_order: 0,
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired = inner.entries.get(key).map(|e| e.expires_at <= now).unwrap_or(false);
        if expired {
            inner.entries.remove(key);
        }
        let next_order = inner.next_order;
        inner.next_order += 1;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.order = next_order;
                inner.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub async fn put(&self, key: String, value: String, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().await;
        let ttl = ttl.unwrap_or(inner.default_ttl);
        let order = inner.next_order;
        inner.next_order += 1;
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
                order,
            },
        );

        while inner.entries.len() > inner.max_size {
            if let Some(oldest_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.order)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(key);
    }

    /// Bulk-removes every key containing `pattern` as a substring; returns
    /// the count removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.inner.lock().await;
        let keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.contains(pattern))
            .cloned()
            .collect();
        let count = keys.len();
        for key in keys {
            inner.entries.remove(&key);
        }
        count
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            size: inner.entries.len(),
            max_size: inner.max_size,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_hits() {
        let cache = LruCache::new(10, Duration::from_secs(60));
        cache.put("k".into(), "v".into(), None).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_capacity() {
        let cache = LruCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), "1".into(), None).await;
        cache.put("b".into(), "2".into(), None).await;
        cache.put("c".into(), "3".into(), None).await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("c").await.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn invalidate_pattern_removes_matching_keys() {
        let cache = LruCache::new(10, Duration::from_secs(60));
        cache.put("signal:query:1".into(), "x".into(), None).await;
        cache.put("signal:query:2".into(), "y".into(), None).await;
        cache.put("position:query:1".into(), "z".into(), None).await;
        let removed = cache.invalidate_pattern("signal:query:").await;
        assert_eq!(removed, 2);
        assert_eq!(cache.get("position:query:1").await.as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = LruCache::new(10, Duration::from_millis(1));
        cache.put("k".into(), "v".into(), Some(Duration::from_millis(1))).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }
}
