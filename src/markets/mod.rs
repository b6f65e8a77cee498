mod alphavantage;
mod cache;
mod store;

use async_trait::async_trait;
use polars::prelude::PolarsError;
use thiserror::Error;

pub use alphavantage::AlphaVantageClient;
pub use cache::CachedProvider;
pub use store::CsvReturnStore;

use crate::types::ReturnSeries;

/// Market used when a request does not name one
pub const DEFAULT_MARKET: &str = "US";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No return data found for {0}")]
    NotFound(String),

    #[error("Provider rejected the request: {0}")]
    Api(String),

    #[error("Provider rate limit reached: {0}")]
    RateLimited(String),

    #[error("Insufficient data for {ticker}: {found} data points, need at least {required}")]
    InsufficientData { ticker: String, found: usize, required: usize },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Could not read return frame: {0}")]
    Polars(#[from] PolarsError),
}

/// Source of daily return series.
///
/// Implementations may hit a live API, read files or wrap another provider with a cache.
/// All I/O happens here; the risk engine only sees resolved [`ReturnSeries`].
#[async_trait]
pub trait ReturnSeriesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the daily returns of `ticker` listed on `market`
    async fn daily_returns(&self, ticker: &str, market: &str) -> Result<ReturnSeries, ProviderError>;
}
