extern crate portfolio_risk;

use std::collections::HashMap;
use std::env::temp_dir;
use std::fs::{create_dir_all, remove_dir_all};

use approx::{assert_abs_diff_eq, assert_relative_eq};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use portfolio_risk::markets::{CachedProvider, CsvReturnStore, ProviderError, ReturnSeriesProvider};
use portfolio_risk::risk::{BetaReference, Metric, MetricWarning};
use portfolio_risk::{compute_risk_metrics, AnalysisRequest, ReturnSeries, RiskAnalyzer, RiskConfig, RiskError};

const A: [f64; 15] = [
    0.012, -0.008, 0.004, 0.015, -0.011, 0.002, 0.007, -0.004, 0.009, -0.013, 0.006, 0.001, -0.002, 0.010, -0.005,
];
const B: [f64; 15] = [
    -0.003, 0.006, 0.011, -0.007, 0.002, 0.008, -0.010, 0.005, 0.000, 0.004, -0.006, 0.009, 0.003, -0.001, 0.007,
];

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn series(values: &[f64]) -> ReturnSeries {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| (start() + Duration::days(i as i64), value))
        .collect()
}

fn instrument(ticker: &str, values: &[f64]) -> (String, ReturnSeries) {
    (ticker.to_string(), series(values))
}

fn sample_variance(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// A single instrument without a benchmark has beta 1 and a unit correlation matrix
#[test]
fn single_instrument_portfolio() {
    let metrics = compute_risk_metrics(&[instrument("A", &A)], &[1.0], None, &RiskConfig::default()).unwrap();

    assert_eq!(metrics.beta, 1.0);
    assert_eq!(metrics.correlation_matrix, vec![vec![1.0]]);
    assert_relative_eq!(metrics.variance, sample_variance(&A) * 252.0, max_relative = 1e-12);
    assert_relative_eq!(metrics.volatility, metrics.asset_volatilities["A"], max_relative = 1e-12);
}

#[test]
fn weights_must_sum_to_one() {
    let instruments = [instrument("A", &A), instrument("B", &B)];

    let result = compute_risk_metrics(&instruments, &[0.6, 0.6], None, &RiskConfig::default());
    assert!(matches!(result, Err(RiskError::InvalidInput(_))));

    // within tolerance
    let result = compute_risk_metrics(&instruments, &[0.5, 0.505], None, &RiskConfig::default());
    assert!(result.is_ok());
}

#[test]
fn identical_series_are_perfectly_correlated() {
    let instruments = [instrument("A", &A), instrument("B", &A)];
    let metrics = compute_risk_metrics(&instruments, &[0.5, 0.5], None, &RiskConfig::default()).unwrap();

    assert_abs_diff_eq!(metrics.correlation_matrix[0][1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.correlation_matrix[1][0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(metrics.asset_volatilities["A"], metrics.asset_volatilities["B"], max_relative = 1e-12);
    assert_relative_eq!(metrics.volatility, metrics.asset_volatilities["A"], max_relative = 1e-12);
}

#[test]
fn negated_series_are_perfectly_anticorrelated() {
    let negated = A.iter().map(|r| -r).collect::<Vec<_>>();
    let instruments = [instrument("A", &A), instrument("B", &negated)];
    let metrics = compute_risk_metrics(&instruments, &[0.5, 0.5], None, &RiskConfig::default()).unwrap();

    assert_abs_diff_eq!(metrics.correlation_matrix[0][1], -1.0, epsilon = 1e-12);

    // the two legs cancel out
    assert_abs_diff_eq!(metrics.volatility, 0.0, epsilon = 1e-9);
}

#[test]
fn annualization_is_consistent() {
    let instruments = [instrument("A", &A), instrument("B", &B)];
    let config = RiskConfig::default();
    let metrics = compute_risk_metrics(&instruments, &[0.3, 0.7], None, &config).unwrap();

    assert_relative_eq!(metrics.volatility * metrics.volatility, metrics.variance, max_relative = 1e-12);

    let daily_mean = A
        .iter()
        .zip(B.iter())
        .map(|(a, b)| 0.3 * a + 0.7 * b)
        .sum::<f64>()
        / A.len() as f64;
    assert_relative_eq!(metrics.expected_return, daily_mean * config.trading_days, max_relative = 1e-12);

    let sharpe = (metrics.expected_return - config.risk_free_rate) / metrics.volatility;
    assert_relative_eq!(metrics.sharpe_ratio, sharpe, max_relative = 1e-12);

    let var = (metrics.expected_return - config.var_z_score * metrics.volatility).abs();
    assert_relative_eq!(metrics.value_at_risk_95, var, max_relative = 1e-12);
}

#[test]
fn constant_series_still_produces_a_result() {
    let constant = [0.001; 15];
    let metrics = compute_risk_metrics(&[instrument("C", &constant)], &[1.0], None, &RiskConfig::default()).unwrap();

    assert_abs_diff_eq!(metrics.volatility, 0.0, epsilon = 1e-12);
    assert_eq!(metrics.sharpe_ratio, 0.0);
    assert!(metrics.sharpe_ratio.is_finite());
    assert!(metrics.sortino_ratio.is_finite());
    assert!(metrics
        .warnings
        .contains(&MetricWarning::ZeroDenominator { metric: Metric::SharpeRatio }));
    assert!(metrics.is_degenerate());
}

#[test]
fn benchmark_identical_to_instruments() {
    let instruments = [instrument("A", &A), instrument("B", &A)];
    let benchmark = series(&A);
    let metrics =
        compute_risk_metrics(&instruments, &[0.5, 0.5], Some(&benchmark), &RiskConfig::default()).unwrap();

    assert_relative_eq!(metrics.volatility, metrics.asset_volatilities["A"], max_relative = 1e-12);
    for row in metrics.correlation_matrix.iter() {
        for value in row {
            assert_abs_diff_eq!(*value, 1.0, epsilon = 1e-12);
        }
    }
    assert_eq!(metrics.beta_reference, BetaReference::Benchmark);
    assert_abs_diff_eq!(metrics.beta, 1.0, epsilon = 1e-12);
}

#[test]
fn too_few_common_dates() {
    let short = [instrument("A", &A[..5])];
    let result = compute_risk_metrics(&short, &[1.0], None, &RiskConfig::default());

    assert!(matches!(
        result,
        Err(RiskError::InsufficientData { found: 5, required: 10 })
    ));
}

#[test]
fn only_shared_dates_are_used() {
    // B starts five days later, leaving ten shared dates
    let shifted = B
        .iter()
        .enumerate()
        .map(|(i, &value)| (start() + Duration::days(i as i64 + 5), value))
        .collect::<ReturnSeries>();
    let instruments = [instrument("A", &A), ("B".to_string(), shifted)];
    let metrics = compute_risk_metrics(&instruments, &[0.5, 0.5], None, &RiskConfig::default()).unwrap();

    assert_eq!(metrics.observations, 10);
    assert_eq!(metrics.window_start, start() + Duration::days(5));
    assert_eq!(metrics.window_end, start() + Duration::days(14));
}

#[test]
fn result_serializes_to_json() {
    let metrics = compute_risk_metrics(&[instrument("A", &A)], &[1.0], None, &RiskConfig::default()).unwrap();
    let json = serde_json::to_value(&metrics).unwrap();

    assert_eq!(json["window_start"], "2024-01-01");
    assert_eq!(json["window_end"], "2024-01-15");
    assert_eq!(json["beta_reference"]["kind"], "self_reference");
    assert_eq!(json["correlation_matrix_text"], "1.0000 \n");
}

/// Serves fixed series from memory
struct MemoryProvider(HashMap<String, ReturnSeries>);

#[async_trait]
impl ReturnSeriesProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn daily_returns(&self, ticker: &str, _market: &str) -> Result<ReturnSeries, ProviderError> {
        self.0
            .get(ticker)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))
    }
}

#[tokio::test]
async fn analyzer_through_cache() {
    let data = [("A".to_string(), series(&A)), ("B".to_string(), series(&B))]
        .into_iter()
        .collect();
    let analyzer = RiskAnalyzer::new(CachedProvider::new(MemoryProvider(data)));

    let request = AnalysisRequest::new(["a", "b"]).with_benchmark("A");
    let metrics = analyzer.analyze(&request).await.unwrap();

    let direct = compute_risk_metrics(
        &[instrument("A", &A), instrument("B", &B)],
        &[0.5, 0.5],
        Some(&series(&A)),
        &RiskConfig::default(),
    )
    .unwrap();
    assert_eq!(metrics, direct);
    assert_eq!(analyzer.provider().len().await, 2);
}

#[tokio::test]
async fn analyzer_over_csv_store() {
    let dir = temp_dir().join("portfolio_risk").join("analyzer_over_csv_store");
    if dir.exists() {
        remove_dir_all(&dir).unwrap();
    }
    create_dir_all(&dir).unwrap();

    let store = CsvReturnStore::new(&dir);
    store.save("A", "US", &series(&A)).unwrap();
    store.save("B", "US", &series(&B)).unwrap();

    let analyzer = RiskAnalyzer::new(store);
    let request = AnalysisRequest::new(["A", "B"]).with_weights(vec![0.25, 0.75]);
    let metrics = analyzer.analyze(&request).await.unwrap();

    assert_eq!(metrics.observations, 15);
    assert_eq!(metrics.beta_reference, BetaReference::FirstInstrument("A".to_string()));

    let missing = analyzer.analyze(&AnalysisRequest::new(["A", "Z"])).await;
    assert!(matches!(missing, Err(RiskError::DataUnavailable { .. })));

    remove_dir_all(&dir).unwrap();
}
