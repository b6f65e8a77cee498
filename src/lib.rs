pub mod analyzer;
pub mod config;
pub mod markets;
pub mod risk;
pub mod serialization;
pub mod traits;
pub mod types;

#[cfg(test)]
mod utils;

pub use analyzer::{AnalysisRequest, RiskAnalyzer};
pub use config::{ConfigError, RiskConfig};
pub use risk::{compute_risk_metrics, RiskError, RiskMetrics};
pub use types::ReturnSeries;
