//! Functions for deriving portfolio statistics from aligned daily returns
//!
//! The primary function is [`calculate_metrics`], which consumes the aligned matrix, the
//! weights, and the covariance and correlation matrices, and returns a [`RiskMetrics`].
//! Every degenerate value is replaced by a documented neutral value and reported as a
//! [`MetricWarning`]; only a window too short for sample statistics fails.

use std::collections::BTreeMap;

use log::{info, warn};
use nalgebra::{DMatrix, DVector};

use crate::config::RiskConfig;
use crate::risk::align::{AlignedReturns, MIN_OBSERVATIONS};
use crate::risk::covariance::{clean_variance, sample_covariance, to_rows, Correlation, ZERO_THRESHOLD};
use crate::risk::RiskError;
use crate::risk::result::{format_matrix, BetaReference, Metric, MetricWarning, RiskMetrics};

/// Beta reported when the reference series cannot support a regression
pub const NEUTRAL_BETA: f64 = 1.0;

/// Collects warnings while scalars are validated
#[derive(Default)]
struct Warnings(Vec<MetricWarning>);

impl Warnings {
    fn push(&mut self, warning: MetricWarning) {
        warn!("Degenerate risk metric: {}", warning);
        self.0.push(warning);
    }

    /// Pass finite values through, replace anything else with 0.0
    fn finite(&mut self, value: f64, metric: Metric) -> f64 {
        if value.is_finite() {
            value
        } else {
            self.push(MetricWarning::NonFiniteMetric { metric });
            0.0
        }
    }

    /// Unwrap a ratio, substituting 0.0 when its denominator was zero
    fn ratio(&mut self, value: Option<f64>, metric: Metric) -> f64 {
        match value {
            Some(value) => self.finite(value, metric),
            None => {
                self.push(MetricWarning::ZeroDenominator { metric });
                0.0
            }
        }
    }
}

/// Derive every portfolio and per-asset statistic.
///
/// # Arguments
/// * `tickers` - Instrument identifiers, index-aligned to the matrix columns and weights
/// * `aligned` - Synchronized daily returns, with the benchmark if one was supplied
/// * `weights` - Portfolio weights
/// * `covariance` - Daily sample covariance matrix of `aligned.returns`
/// * `correlation` - Correlation matrix derived from `covariance`
/// * `config` - Risk-free rate, annualization factor and VaR quantile
///
/// # Errors
/// * [`RiskError::InsufficientData`] - If `aligned` holds fewer than [`MIN_OBSERVATIONS`] dates
pub fn calculate_metrics(
    tickers: &[String],
    aligned: &AlignedReturns,
    weights: &[f64],
    covariance: &DMatrix<f64>,
    correlation: &Correlation,
    config: &RiskConfig,
) -> Result<RiskMetrics, RiskError> {
    let (window_start, window_end) = match (aligned.dates.first(), aligned.dates.last()) {
        (Some(first), Some(last)) if aligned.observations() >= MIN_OBSERVATIONS => (*first, *last),
        _ => {
            return Err(RiskError::InsufficientData {
                found: aligned.observations(),
                required: MIN_OBSERVATIONS,
            })
        }
    };

    let mut warnings = Warnings::default();

    for &i in &correlation.degenerate {
        let ticker = tickers[i].clone();
        if covariance[(i, i)].is_finite() {
            warnings.push(MetricWarning::ZeroVarianceInstrument { ticker });
        } else {
            warnings.push(MetricWarning::NonFiniteInstrument { ticker });
        }
    }

    let w = DVector::from_column_slice(weights);
    let daily_returns = calculate_portfolio_returns(&aligned.returns, &w);

    // downstream metrics are computed from the raw values so a substitution never looks like data
    let raw_variance = calculate_portfolio_variance(&w, covariance) * config.trading_days;
    let raw_volatility = raw_variance.sqrt();
    let raw_expected_return = calculate_expected_return(&aligned.returns, &w, config.trading_days);

    let variance = warnings.finite(raw_variance, Metric::Variance);
    let volatility = warnings.finite(raw_volatility, Metric::Volatility);
    let expected_return = warnings.finite(raw_expected_return, Metric::ExpectedReturn);

    let sharpe_ratio = calculate_sharpe_ratio(raw_expected_return, raw_volatility, config.risk_free_rate);
    let sharpe_ratio = warnings.ratio(sharpe_ratio, Metric::SharpeRatio);

    let downside = calculate_downside_deviation(&daily_returns, config.trading_days);
    let sortino_ratio = calculate_sortino_ratio(raw_expected_return, downside, config.risk_free_rate);
    let sortino_ratio = warnings.ratio(sortino_ratio, Metric::SortinoRatio);

    let (beta, beta_reference) = match (&aligned.benchmark, tickers) {
        (Some(benchmark), _) => (calculate_beta(&daily_returns, benchmark), BetaReference::Benchmark),
        // an instrument moves exactly with itself
        (None, [] | [_]) => (Some(NEUTRAL_BETA), BetaReference::SelfReference),
        (None, [first, ..]) => (
            calculate_beta(&daily_returns, &aligned.returns.column(0).into_owned()),
            BetaReference::FirstInstrument(first.clone()),
        ),
    };
    let beta = match beta {
        Some(beta) => warnings.finite(beta, Metric::Beta),
        None => {
            warnings.push(MetricWarning::DegenerateBeta);
            NEUTRAL_BETA
        }
    };

    let value_at_risk = calculate_value_at_risk(raw_expected_return, raw_volatility, config.var_z_score);
    let value_at_risk_95 = warnings.finite(value_at_risk, Metric::ValueAtRisk);

    let asset_volatilities = tickers
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let volatility = (clean_variance(covariance[(i, i)]) * config.trading_days).sqrt();
            let volatility = warnings.finite(volatility, Metric::AssetVolatility(ticker.clone()));
            (ticker.clone(), volatility)
        })
        .collect::<BTreeMap<_, _>>();

    let correlation_matrix = to_rows(&correlation.matrix);
    let correlation_matrix_text = format_matrix(&correlation_matrix);

    info!(
        "Risk metrics over {} observations: volatility {:.2}%, expected return {:.2}%, Sharpe {:.2}, Sortino {:.2}, beta {:.2}, VaR(95) {:.2}%",
        aligned.observations(),
        volatility * 100.0,
        expected_return * 100.0,
        sharpe_ratio,
        sortino_ratio,
        beta,
        value_at_risk_95 * 100.0,
    );

    Ok(RiskMetrics {
        tickers: tickers.to_vec(),
        variance,
        volatility,
        expected_return,
        sharpe_ratio,
        sortino_ratio,
        beta,
        beta_reference,
        value_at_risk_95,
        asset_volatilities,
        correlation_matrix,
        correlation_matrix_text,
        observations: aligned.observations(),
        window_start,
        window_end,
        warnings: warnings.0,
    })
}

/// Weighted daily portfolio return for each aligned date
pub fn calculate_portfolio_returns(returns: &DMatrix<f64>, weights: &DVector<f64>) -> DVector<f64> {
    returns * weights
}

/// Daily portfolio variance `wᵀ·Σ·w`.
///
/// Rounding can push the quadratic form of a positive semi-definite matrix slightly below
/// zero; such values are reported as 0.0.
pub fn calculate_portfolio_variance(weights: &DVector<f64>, covariance: &DMatrix<f64>) -> f64 {
    clean_variance(weights.dot(&(covariance * weights)))
}

/// Annualized weighted mean of the per-instrument daily returns
pub fn calculate_expected_return(returns: &DMatrix<f64>, weights: &DVector<f64>, trading_days: f64) -> f64 {
    let daily = (0..returns.ncols())
        .map(|col| returns.column(col).mean() * weights[col])
        .sum::<f64>();
    daily * trading_days
}

/// Measure additional return for the volatility endured.
///
/// # Returns
/// * `None` - If the volatility is zero, in which case the ratio is undefined
pub fn calculate_sharpe_ratio(expected_return: f64, volatility: f64, risk_free_rate: f64) -> Option<f64> {
    if volatility.abs() < ZERO_THRESHOLD {
        None
    } else {
        Some((expected_return - risk_free_rate) / volatility)
    }
}

/// Annualized deviation of the negative daily returns.
///
/// Only days with a negative return contribute to the numerator, but the mean is taken over
/// every day so that rare losses are not overstated. Any non-finite day makes the result NaN.
pub fn calculate_downside_deviation(daily_returns: &DVector<f64>, trading_days: f64) -> f64 {
    if daily_returns.is_empty() {
        return 0.0;
    }
    if daily_returns.iter().any(|r| !r.is_finite()) {
        return f64::NAN;
    }

    let squared_losses = daily_returns
        .iter()
        .filter(|r| **r < 0.0)
        .map(|r| r * r)
        .sum::<f64>();

    (squared_losses / daily_returns.len() as f64).sqrt() * trading_days.sqrt()
}

/// Measure additional return per unit of downside deviation.
///
/// # Returns
/// * `None` - If there is no downside deviation, in which case the ratio is undefined
pub fn calculate_sortino_ratio(expected_return: f64, downside_deviation: f64, risk_free_rate: f64) -> Option<f64> {
    if downside_deviation.abs() < ZERO_THRESHOLD {
        None
    } else {
        Some((expected_return - risk_free_rate) / downside_deviation)
    }
}

/// Measure the sensitivity of the portfolio to a reference series.
///
/// Both moments are sample moments over the same aligned window, so their `T - 1`
/// denominators cancel.
///
/// # Returns
/// * `None` - If the reference variance is zero, NaN or infinite
pub fn calculate_beta(portfolio_returns: &DVector<f64>, reference_returns: &DVector<f64>) -> Option<f64> {
    let reference_variance = sample_covariance(reference_returns, reference_returns);
    if !reference_variance.is_finite() || reference_variance.abs() < ZERO_THRESHOLD * ZERO_THRESHOLD {
        return None;
    }

    let beta = sample_covariance(portfolio_returns, reference_returns) / reference_variance;
    beta.is_finite().then_some(beta)
}

/// Parametric Value at Risk `|μ - z·σ|` from the annualized return and volatility.
///
/// This assumes normally distributed returns. It approximates the loss threshold at the
/// confidence level implied by `z_score`; it is not a bound on the worst loss.
pub fn calculate_value_at_risk(expected_return: f64, volatility: f64, z_score: f64) -> f64 {
    (expected_return - z_score * volatility).abs()
}
