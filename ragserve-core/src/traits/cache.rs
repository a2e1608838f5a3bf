//! Shared cache store: analytics/health caching and rate-limit counters

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Process-wide cache. Keys are namespaced by tenant where applicable
/// (`usage_stats:{tenant}:…`, `rl:{tenant}:{minute}`).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Increment a fixed-window counter, creating it with the window TTL on
    /// first use. Returns the post-increment count.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64>;
}
