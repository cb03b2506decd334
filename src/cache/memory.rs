//! In-memory cache implementation using moka
//!
//! Every entry carries its own time-to-live, enforced through moka's
//! `Expiry` policy, so short-lived feed pages and long-lived values can share
//! one store.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// JSON-serialized value plus the lifetime it was stored with
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expires each entry after the TTL it was inserted with.
struct PerEntryExpiry;

impl Expiry<String, CacheEntry> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    /// Lifetime used when `set` is called with a zero TTL
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a memory cache with 10,000 entries and a one hour default TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a memory cache with custom capacity and default TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache, default_ttl }
    }

    /// Get the default TTL for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        // moka's iter() yields (Arc<K>, V)
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();

        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = MemoryCache::new();
        let result: Option<String> = cache.get("absent").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_overwrite_existing_key() {
        let cache = MemoryCache::new();

        cache.set("key", &"first".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("key", &"second".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("key").await.unwrap();
        assert_eq!(result, Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_short_ttl_expires_before_long_ttl() {
        let cache = MemoryCache::new();

        cache.set("short", &"a".to_string(), Duration::from_millis(20)).await.unwrap();
        cache.set("long", &"b".to_string(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.cache.run_pending_tasks().await;

        let short: Option<String> = cache.get("short").await.unwrap();
        let long: Option<String> = cache.get("long").await.unwrap();
        assert_eq!(short, None);
        assert_eq!(long, Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(60));

        cache.set("key", &42i64, Duration::ZERO).await.unwrap();

        let result: Option<i64> = cache.get("key").await.unwrap();
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_delete_prefix_keeps_other_keys() {
        let cache = MemoryCache::new();

        cache.set("index_page:anonymous:1", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("index_page:anonymous:2", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("other:index_page:1", &"kept".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.delete_prefix("index_page:").await.unwrap();

        let r1: Option<String> = cache.get("index_page:anonymous:1").await.unwrap();
        let r2: Option<String> = cache.get("index_page:anonymous:2").await.unwrap();
        let other: Option<String> = cache.get("other:index_page:1").await.unwrap();
        assert_eq!(r1, None);
        assert_eq!(r2, None);
        assert_eq!(other, Some("kept".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let cache = MemoryCache::new();
        cache.set("key", &"text".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Result<Option<i64>> = cache.get("key").await;
        assert!(result.is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Stored strings come back unchanged while they are alive.
            #[test]
            fn stored_html_is_returned_verbatim(
                key in "[a-z:0-9]{1,30}",
                html in "\\PC{0,200}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new();
                    cache.set(&key, &html, Duration::from_secs(60)).await.unwrap();
                    let result: Option<String> = cache.get(&key).await.unwrap();
                    prop_assert_eq!(result, Some(html.clone()));
                    Ok(())
                })?;
            }
        }
    }
}
