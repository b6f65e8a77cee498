use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::serialization::naive_date_serializer;

/// Scalar outputs of the calculator, used to attribute warnings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Variance,
    Volatility,
    ExpectedReturn,
    SharpeRatio,
    SortinoRatio,
    Beta,
    ValueAtRisk,
    AssetVolatility(String),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Variance => write!(f, "variance"),
            Metric::Volatility => write!(f, "volatility"),
            Metric::ExpectedReturn => write!(f, "expected return"),
            Metric::SharpeRatio => write!(f, "Sharpe ratio"),
            Metric::SortinoRatio => write!(f, "Sortino ratio"),
            Metric::Beta => write!(f, "beta"),
            Metric::ValueAtRisk => write!(f, "value at risk"),
            Metric::AssetVolatility(ticker) => write!(f, "{} volatility", ticker),
        }
    }
}

/// A numerical degeneracy that was recovered with a neutral value.
///
/// Warnings never invalidate the result; they explain which fields hold substituted
/// values rather than computed ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricWarning {
    /// The instrument's returns are constant. Its correlation row and column fall back to
    /// the identity: 1.0 with itself and 0.0 with every other instrument.
    ZeroVarianceInstrument { ticker: String },

    /// The instrument's returns contain NaN or infinite values. Its correlation row and
    /// column fall back to the identity.
    NonFiniteInstrument { ticker: String },

    /// The denominator of a ratio was zero, so the ratio is reported as 0.0
    ZeroDenominator { metric: Metric },

    /// The reference series for beta has zero or non-finite variance, so beta is 1.0
    DegenerateBeta,

    /// A computed value was NaN or infinite and was replaced with 0.0
    NonFiniteMetric { metric: Metric },
}

impl fmt::Display for MetricWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricWarning::ZeroVarianceInstrument { ticker } => {
                write!(f, "{} has zero variance; identity correlation substituted", ticker)
            }
            MetricWarning::NonFiniteInstrument { ticker } => {
                write!(f, "{} has non-finite returns; identity correlation substituted", ticker)
            }
            MetricWarning::ZeroDenominator { metric } => {
                write!(f, "{} has a zero denominator; reported as 0.0", metric)
            }
            MetricWarning::DegenerateBeta => {
                write!(f, "beta reference has degenerate variance; reported as 1.0")
            }
            MetricWarning::NonFiniteMetric { metric } => {
                write!(f, "{} was not finite; reported as 0.0", metric)
            }
        }
    }
}

/// The series beta was measured against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ticker", rename_all = "snake_case")]
pub enum BetaReference {
    /// An explicitly supplied benchmark series
    Benchmark,

    /// No benchmark was supplied; the first instrument stands in for the market
    FirstInstrument(String),

    /// Single instrument without a benchmark. Beta is 1.0 by definition.
    SelfReference,
}

/// Risk metrics for a weighted basket of instruments
///
/// All return quantities are annualized.
///
/// ## Volatility
///
/// Square root of the annualized portfolio variance `wᵀ·Σ·w`, where `Σ` is the sample
/// covariance matrix of daily returns.
///
/// ## Sharpe and Sortino ratios
///
/// Excess return over the risk-free rate per unit of total volatility (Sharpe) or per unit
/// of downside deviation (Sortino). Both are 0.0 when their denominator is zero.
///
/// ## Beta
///
/// Sensitivity of the portfolio's daily returns to the reference series described by
/// `beta_reference`.
///
/// - 1: The portfolio moves in line with the reference.
/// - > 1: The portfolio amplifies the reference's moves.
/// - < 1: The portfolio dampens the reference's moves.
/// - Negative: The portfolio tends to move against the reference.
///
/// ## Value at Risk (VaR)
///
/// Parametric estimate `|μ - z·σ|` at 95% confidence. It assumes normally distributed
/// returns and is an approximation, not a bound on the worst possible loss.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub tickers: Vec<String>,

    pub variance: f64,
    pub volatility: f64,
    pub expected_return: f64,

    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    pub beta: f64,
    pub beta_reference: BetaReference,
    pub value_at_risk_95: f64,

    pub asset_volatilities: BTreeMap<String, f64>,
    pub correlation_matrix: Vec<Vec<f64>>,
    pub correlation_matrix_text: String,

    /// Number of aligned trading dates the metrics were computed over
    pub observations: usize,
    #[serde(serialize_with = "naive_date_serializer")]
    pub window_start: NaiveDate,
    #[serde(serialize_with = "naive_date_serializer")]
    pub window_end: NaiveDate,

    pub warnings: Vec<MetricWarning>,
}

impl RiskMetrics {
    /// Whether any field holds a substituted value
    pub fn is_degenerate(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Render a matrix as four-decimal fixed point values, each followed by a space, one row
/// per line
pub fn format_matrix(matrix: &[Vec<f64>]) -> String {
    matrix
        .iter()
        .map(|row| {
            let mut line = row.iter().map(|value| format!("{:.4} ", value)).collect::<String>();
            line.push('\n');
            line
        })
        .collect()
}
