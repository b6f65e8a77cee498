//! Portfolio risk analytics engine.
//!
//! [`compute_risk_metrics`] runs the three stages in order: the aligner synchronizes the
//! return series on their common dates, the covariance engine builds the covariance and
//! correlation matrices, and the calculator derives the portfolio statistics. Every stage
//! is a pure function over in-memory data.
pub mod align;
pub mod covariance;
pub mod metrics;
mod result;

use std::collections::HashSet;

use log::{debug, info};
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::config::RiskConfig;
use crate::markets::ProviderError;
use crate::types::{validate_weights, ReturnSeries};

pub use align::{align_returns, AlignedReturns, MIN_OBSERVATIONS};
pub use covariance::{correlation_matrix, covariance_matrix, Correlation};
pub use metrics::{calculate_metrics, NEUTRAL_BETA};
pub use result::{format_matrix, BetaReference, Metric, MetricWarning, RiskMetrics};

#[derive(Error, Debug)]
pub enum RiskError {
    /// The request cannot be computed as given; the caller has to fix it
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Too few dates are shared by every series
    #[error("Insufficient synchronized data: found {found} common dates, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    /// The return-series provider could not supply an instrument
    #[error("Return data unavailable for {ticker}: {source}")]
    DataUnavailable {
        ticker: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to align return series: {0}")]
    Alignment(#[from] PolarsError),
}

/// Compute risk and performance metrics for a weighted basket of instruments.
///
/// # Arguments
/// * `instruments` - Ticker and daily return series of every instrument, in weight order
/// * `weights` - Portfolio weights, each in (0, 1], summing to 1.0 within the configured tolerance
/// * `benchmark` - Optional benchmark series used for beta
/// * `config` - Risk-free rate and the remaining calculation parameters
///
/// # Errors
/// * [`RiskError::InvalidInput`] - If the configuration, tickers, weights or series are malformed
/// * [`RiskError::InsufficientData`] - If the series share fewer than `config.min_common_dates` dates
/// * [`RiskError::Alignment`] - If the intermediate frames cannot be joined
///
/// Numerical degeneracies never fail the call; see [`RiskMetrics::warnings`].
pub fn compute_risk_metrics(
    instruments: &[(String, ReturnSeries)],
    weights: &[f64],
    benchmark: Option<&ReturnSeries>,
    config: &RiskConfig,
) -> Result<RiskMetrics, RiskError> {
    config
        .validate()
        .map_err(|e| RiskError::InvalidInput(e.to_string()))?;

    if instruments.is_empty() {
        return Err(RiskError::InvalidInput("Instrument list cannot be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for (ticker, series) in instruments {
        if ticker.trim().is_empty() {
            return Err(RiskError::InvalidInput("Ticker cannot be empty".to_string()));
        }
        if !seen.insert(ticker.as_str()) {
            return Err(RiskError::InvalidInput(format!("Duplicate ticker: {}", ticker)));
        }
        if series.is_empty() {
            return Err(RiskError::InvalidInput(format!("Return series for {} is empty", ticker)));
        }
    }

    validate_weights(weights, instruments.len(), config.weight_tolerance)?;

    let tickers = instruments.iter().map(|(ticker, _)| ticker.clone()).collect::<Vec<_>>();
    info!("Calculating risk metrics for {} instruments: {}", tickers.len(), tickers.join(", "));

    let series = instruments.iter().map(|(_, series)| series).collect::<Vec<_>>();
    let aligned = align_returns(&series, benchmark, config.min_common_dates)?;
    debug!("Using {} common dates", aligned.observations());

    let covariance = covariance_matrix(&aligned.returns);
    let correlation = correlation_matrix(&covariance);

    calculate_metrics(&tickers, &aligned, weights, &covariance, &correlation, config)
}
