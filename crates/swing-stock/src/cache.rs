//! In-memory TTL caches for prices, feeds and article bodies

use crate::config::CacheConfig;
use cached::{Cached, TimedCache};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key: what is cached (`kind`), for whom (`subject`) and with which arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: &'static str,
    pub subject: String,
    pub params: String,
}

impl CacheKey {
    pub fn new(kind: &'static str, subject: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            params: params.into(),
        }
    }

    /// Price history for `symbol` over `range`
    pub fn history(symbol: &str, range: &str) -> Self {
        Self::new("history", symbol, range)
    }

    /// Parsed feed at `url`
    pub fn feed(url: &str) -> Self {
        Self::new("feed", url, "")
    }

    /// Extracted article text for `url`
    pub fn article(url: &str) -> Self {
        Self::new("article", url, "")
    }
}

/// Thread-safe TTL cache storing JSON values
#[derive(Clone)]
pub struct StockCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl StockCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        // TimedCache evicts on read, so even lookups take the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Typed lookup; entries that no longer deserialize are treated as misses
    pub async fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    /// Typed insert; values that fail to serialize are not cached
    pub async fn insert_as<T: Serialize>(&self, key: CacheKey, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.insert(key, json).await;
        }
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// If the value exists in cache, it's returned immediately.
    /// Otherwise, the fetcher function is called and the result is cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: CacheKey,
        fetcher: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!(kind = key.kind, subject = %key.subject, "Cache hit");
            return Ok(value);
        }

        debug!(kind = key.kind, subject = %key.subject, "Cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;

        Ok(value)
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// One cache per data family, each with its own lifetime
#[derive(Clone)]
pub struct CacheManager {
    /// Price histories
    pub prices: StockCache,
    /// Parsed feeds
    pub news: StockCache,
    /// Extracted article bodies
    pub articles: StockCache,
}

impl CacheManager {
    pub fn new(prices_ttl: Duration, news_ttl: Duration, articles_ttl: Duration) -> Self {
        Self {
            prices: StockCache::new(prices_ttl),
            news: StockCache::new(news_ttl),
            articles: StockCache::new(articles_ttl),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.prices_ttl_secs),
            Duration::from_secs(config.news_ttl_secs),
            Duration::from_secs(config.articles_ttl_secs),
        )
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.prices.clear().await;
        self.news.clear().await;
        self.articles.clear().await;
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::history("TCS.NS", "1y");
        let value = json!([{"close": 3900.5}]);

        cache.insert(key.clone(), value.clone()).await;
        assert_eq!(cache.get(&key).await, Some(value));
        assert!(cache.get(&CacheKey::history("TCS.NS", "6mo")).await.is_none());
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::article("https://example.com/a");

        cache.insert_as(key.clone(), &"body text".to_string()).await;
        let text: Option<String> = cache.get_as(&key).await;
        assert_eq!(text.as_deref(), Some("body text"));

        let wrong: Option<Vec<f64>> = cache.get_as(&key).await;
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::feed("https://example.com/rss");
        let value = json!({"items": 3});

        let mut call_count = 0;
        let result = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                async { Ok::<_, String>(value.clone()) }
            })
            .await
            .unwrap();
        assert_eq!(result, value);
        assert_eq!(call_count, 1);

        let result = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                async { Ok::<_, String>(json!(null)) }
            })
            .await
            .unwrap();
        assert_eq!(result, value);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::feed("https://example.com/down");

        let result = cache
            .get_or_fetch(key.clone(), || async { Err::<serde_json::Value, _>("offline") })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_invalidation_and_clear() {
        let cache = StockCache::new(Duration::from_secs(60));
        for symbol in ["INFY.NS", "TCS.NS", "WIPRO.NS"] {
            cache.insert(CacheKey::history(symbol, "1y"), json!(1)).await;
        }
        assert_eq!(cache.len().await, 3);

        cache.invalidate(&CacheKey::history("TCS.NS", "1y")).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_manager() {
        let manager = CacheManager::default();
        manager.prices.insert(CacheKey::history("SBIN.NS", "1y"), json!(1)).await;
        manager.news.insert(CacheKey::feed("f"), json!(2)).await;
        manager.articles.insert(CacheKey::article("a"), json!(3)).await;

        assert_eq!(manager.prices.len().await, 1);
        assert_eq!(manager.news.len().await, 1);
        assert_eq!(manager.articles.len().await, 1);

        manager.clear_all().await;
        assert!(manager.prices.is_empty().await);
        assert!(manager.news.is_empty().await);
        assert!(manager.articles.is_empty().await);
    }

    #[test]
    fn test_usable_outside_runtime() {
        let cache = StockCache::new(Duration::from_secs(60));
        tokio_test::block_on(async {
            cache.insert(CacheKey::history("ITC.NS", "3mo"), json!(42)).await;
            assert_eq!(cache.get(&CacheKey::history("ITC.NS", "3mo")).await, Some(json!(42)));
        });
    }
}
