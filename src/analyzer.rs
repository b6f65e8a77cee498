use std::collections::HashSet;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::markets::{ReturnSeriesProvider, DEFAULT_MARKET};
use crate::risk::{compute_risk_metrics, RiskError, RiskMetrics};
use crate::types::{equal_weights, ReturnSeries};

/// Longest ticker accepted, exchange suffix included
pub const MAX_TICKER_LEN: usize = 10;

fn default_market() -> String {
    DEFAULT_MARKET.to_string()
}

/// Portfolio to analyze.
///
/// `weights` follow the order of `tickers`. When absent or empty every instrument gets `1/N`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub tickers: Vec<String>,

    #[serde(default)]
    pub weights: Option<Vec<f64>>,

    #[serde(default)]
    pub benchmark: Option<String>,

    #[serde(default = "default_market")]
    pub market: String,
}

impl AnalysisRequest {
    pub fn new<S: Into<String>>(tickers: impl IntoIterator<Item = S>) -> Self {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            weights: None,
            benchmark: None,
            market: default_market(),
        }
    }

    /// Builder method for explicit portfolio weights
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Builder method for the benchmark used for beta
    pub fn with_benchmark<S: Into<String>>(mut self, benchmark: S) -> Self {
        self.benchmark = Some(benchmark.into());
        self
    }

    pub fn with_market<S: Into<String>>(mut self, market: S) -> Self {
        self.market = market.into();
        self
    }
}

/// Fetches return series through a provider and runs the risk engine on them
pub struct RiskAnalyzer<P: ReturnSeriesProvider> {
    provider: P,
    config: RiskConfig,
}

impl<P: ReturnSeriesProvider> RiskAnalyzer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: RiskConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RiskConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Analyze the risk of the requested portfolio
    ///
    /// # Errors
    /// * [`RiskError::InvalidInput`] - If the tickers, benchmark or weights are malformed
    /// * [`RiskError::DataUnavailable`] - If the provider cannot supply an instrument
    /// * Any error returned by [`compute_risk_metrics`]
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<RiskMetrics, RiskError> {
        let tickers = normalize_tickers(&request.tickers, self.config.max_instruments)?;
        let benchmark = request
            .benchmark
            .as_deref()
            .filter(|benchmark| !benchmark.trim().is_empty())
            .map(normalize_ticker)
            .transpose()?;

        let weights = match &request.weights {
            Some(weights) if !weights.is_empty() => weights.clone(),
            _ => equal_weights(tickers.len()),
        };

        info!(
            "Analyzing portfolio of {} on {} with {} data",
            tickers.join(", "),
            request.market,
            self.provider.name()
        );

        let mut instruments = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let series = self.fetch(&ticker, &request.market).await?;
            instruments.push((ticker, series));
        }

        let benchmark_series = match &benchmark {
            Some(benchmark) => Some(self.fetch(benchmark, &request.market).await?),
            None => None,
        };

        let metrics = compute_risk_metrics(&instruments, &weights, benchmark_series.as_ref(), &self.config)?;
        info!(
            "Analysis complete: volatility {:.4}, sharpe {:.4}, beta {:.4}, {} warnings",
            metrics.volatility,
            metrics.sharpe_ratio,
            metrics.beta,
            metrics.warnings.len()
        );
        Ok(metrics)
    }

    async fn fetch(&self, ticker: &str, market: &str) -> Result<ReturnSeries, RiskError> {
        self.provider.daily_returns(ticker, market).await.map_err(|source| {
            error!("Could not fetch returns for {}: {}", ticker, source);
            RiskError::DataUnavailable {
                ticker: ticker.to_string(),
                source,
            }
        })
    }
}

/// Uppercase a ticker and check it only uses `[A-Z0-9.]`
fn normalize_ticker(ticker: &str) -> Result<String, RiskError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN {
        return Err(RiskError::InvalidInput(format!(
            "Ticker must have 1 to {} characters, got {:?}",
            MAX_TICKER_LEN, ticker
        )));
    }
    if !ticker.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.') {
        return Err(RiskError::InvalidInput(format!("Invalid ticker: {}", ticker)));
    }
    Ok(ticker)
}

fn normalize_tickers(tickers: &[String], max_instruments: usize) -> Result<Vec<String>, RiskError> {
    if tickers.is_empty() {
        return Err(RiskError::InvalidInput("At least one ticker is required".to_string()));
    }
    if tickers.len() > max_instruments {
        return Err(RiskError::InvalidInput(format!(
            "At most {} tickers are allowed, got {}",
            max_instruments,
            tickers.len()
        )));
    }

    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|ticker| {
            let ticker = normalize_ticker(ticker)?;
            if !seen.insert(ticker.clone()) {
                return Err(RiskError::InvalidInput(format!("Duplicate ticker: {}", ticker)));
            }
            Ok(ticker)
        })
        .collect()
}
