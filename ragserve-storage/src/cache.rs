//! Shared in-process cache store.
//!
//! Backs the analytics/health caches (TTL entries) and the rate-limiting
//! fixed-window counters. Keys are namespaced by tenant where applicable.

use async_trait::async_trait;
use dashmap::DashMap;
use ragserve_core::traits::cache::CacheStore;
use ragserve_core::Result;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

/// Process-wide cache with TTL expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    counters: DashMap<String, WindowCounter>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are removed lazily on the read path
        self.entries
            .remove_if(key, |_, e| e.expires_at <= Instant::now());
        Ok(None)
    }

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64> {
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_insert(WindowCounter {
            count: 0,
            expires_at: now + window,
        });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;
        Ok(counter.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .put("health:t1", json!({"status": "healthy"}), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(cache.get("health:t1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("health:t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn window_counter_increments_and_resets() {
        let cache = MemoryCache::new();
        let key = "rl:tenant:12345";
        assert_eq!(cache.incr_window(key, Duration::from_millis(30)).await.unwrap(), 1);
        assert_eq!(cache.incr_window(key, Duration::from_millis(30)).await.unwrap(), 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.incr_window(key, Duration::from_millis(30)).await.unwrap(), 1);
    }
}
