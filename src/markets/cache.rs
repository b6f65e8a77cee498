use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use tokio::sync::RwLock;

use crate::markets::{ProviderError, ReturnSeriesProvider};
use crate::types::ReturnSeries;

/// Cached series are refetched after a day
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Number of cached series kept before the cache is flushed
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

#[derive(Debug, Clone)]
struct CacheEntry {
    series: ReturnSeries,
    fetched_at: DateTime<Utc>,
}

/// Wraps another provider and memoizes its return series per ticker and market.
///
/// Entries older than the time-to-live are refetched. Once `capacity` entries are stored
/// the whole cache is dropped before the next insert. Errors are never cached.
pub struct CachedProvider<P: ReturnSeriesProvider> {
    inner: P,
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl<P: ReturnSeriesProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::hours(DEFAULT_CACHE_TTL_HOURS),
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Builder method for how long a fetched series stays valid
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder method for the number of series kept in memory
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of entries currently held, including expired ones
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    fn key(ticker: &str, market: &str) -> String {
        format!("{}_{}", ticker.trim().to_uppercase(), market.trim().to_uppercase())
    }
}

#[async_trait]
impl<P: ReturnSeriesProvider> ReturnSeriesProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn daily_returns(&self, ticker: &str, market: &str) -> Result<ReturnSeries, ProviderError> {
        let key = Self::key(ticker, market);

        if let Some(entry) = self.entries.read().await.get(&key) {
            if Utc::now() - entry.fetched_at < self.ttl {
                debug!("Cache hit for {}", key);
                return Ok(entry.series.clone());
            }
            debug!("Cache entry for {} expired", key);
        }

        let series = self.inner.daily_returns(ticker, market).await?;

        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            info!("Return cache full ({} entries), clearing", entries.len());
            entries.clear();
        }
        entries.insert(
            key,
            CacheEntry {
                series: series.clone(),
                fetched_at: Utc::now(),
            },
        );

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed series and counts how often it was asked
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReturnSeriesProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn daily_returns(&self, ticker: &str, _market: &str) -> Result<ReturnSeries, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker == "MISSING" {
                return Err(ProviderError::NotFound(ticker.to_string()));
            }
            let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
            Ok([(date, 0.01)].into_iter().collect())
        }
    }

    #[tokio::test]
    async fn test_repeated_requests_hit_cache() {
        let provider = CachedProvider::new(CountingProvider::new());

        let first = provider.daily_returns("aapl", "us").await.unwrap();
        let second = provider.daily_returns("AAPL", "US").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.inner().calls(), 1);
        assert_eq!(provider.len().await, 1);
        assert_eq!(provider.name(), "counting");
    }

    #[tokio::test]
    async fn test_markets_are_cached_separately() {
        let provider = CachedProvider::new(CountingProvider::new());

        provider.daily_returns("TCS", "US").await.unwrap();
        provider.daily_returns("TCS", "INDIA").await.unwrap();

        assert_eq!(provider.inner().calls(), 2);
        assert_eq!(provider.len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = CachedProvider::new(CountingProvider::new()).with_ttl(Duration::zero());

        provider.daily_returns("AAPL", "US").await.unwrap();
        provider.daily_returns("AAPL", "US").await.unwrap();

        assert_eq!(provider.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let provider = CachedProvider::new(CountingProvider::new());

        assert!(provider.daily_returns("MISSING", "US").await.is_err());
        assert!(provider.daily_returns("MISSING", "US").await.is_err());

        assert_eq!(provider.inner().calls(), 2);
        assert!(provider.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_cache_is_flushed() {
        let provider = CachedProvider::new(CountingProvider::new()).with_capacity(2);

        provider.daily_returns("A", "US").await.unwrap();
        provider.daily_returns("B", "US").await.unwrap();
        assert_eq!(provider.len().await, 2);

        provider.daily_returns("C", "US").await.unwrap();
        assert_eq!(provider.len().await, 1);

        provider.clear().await;
        assert!(provider.is_empty().await);
    }
}
