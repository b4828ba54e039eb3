// src/cache.rs
//! Process-wide response cache with a fixed TTL and hit/miss accounting.
//!
//! One instance serves one upstream; the TTL is fixed per instance. Entries
//! older than the TTL count as misses and are evicted on read. All access
//! goes through `get`/`set`; the mutex is only held for instantaneous
//! operations, never across an await.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::types::{ContentItem, ReplyItem};

/// Payload kinds memoized by the fetch layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Items(Vec<ContentItem>),
    Replies(Vec<ReplyItem>),
}

/// Cumulative counters since process start or the last `clear`. Exposed for
/// observability only; never consulted for control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

struct Entry {
    value: CachedValue,
    inserted_at: Instant,
}

#[derive(Default)]
struct Inner {
    map: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

pub struct ResponseCache {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let fresh = guard
            .map
            .get(key)
            .map(|e| e.inserted_at.elapsed() < self.ttl);
        match fresh {
            Some(true) => {
                guard.hits += 1;
                guard.map.get(key).map(|e| e.value.clone())
            }
            Some(false) => {
                guard.map.remove(key);
                guard.misses += 1;
                None
            }
            None => {
                guard.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: CachedValue) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.insert(
            key.into(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Current counters. Expired entries are pruned first so `keys` reflects
    /// live entries only.
    pub fn stats(&self) -> CacheStats {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let ttl = self.ttl;
        guard.map.retain(|_, e| e.inserted_at.elapsed() < ttl);
        CacheStats {
            hits: guard.hits,
            misses: guard.misses,
            keys: guard.map.len(),
        }
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.clear();
        guard.hits = 0;
        guard.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            title: format!("post {id}"),
            body: None,
            author: "someone".into(),
            community: "programming".into(),
            score: 1,
            reply_count: 0,
            created_utc: 0,
            permalink: format!("/r/programming/comments/{id}/"),
            relevance_score: None,
        }
    }

    #[test]
    fn miss_then_hit_updates_counters() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        cache.set("k", CachedValue::Items(vec![item("a")]));
        assert!(cache.get("k").is_some());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.keys), (1, 1, 1));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let cache = ResponseCache::new(Duration::from_millis(30));
        cache.set("k", CachedValue::Items(vec![item("a")]));
        // Sleep well past the TTL to avoid boundary flakes.
        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get("k").is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 0);
    }

    #[test]
    fn clear_resets_counters_and_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("k", CachedValue::Replies(Vec::new()));
        let _ = cache.get("k");
        let _ = cache.get("absent");
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
