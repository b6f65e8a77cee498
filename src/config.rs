use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
pub const DEFAULT_TRADING_DAYS: f64 = 252.0;
pub const DEFAULT_VAR_Z_SCORE: f64 = 1.645;
pub const DEFAULT_MIN_COMMON_DATES: usize = 10;
pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 0.01;
pub const DEFAULT_MAX_INSTRUMENTS: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters of a risk analysis.
///
/// Every field has a default, so a TOML document only needs to mention the values it
/// overrides.
///
/// ```toml
/// risk_free_rate = 0.035
/// min_common_dates = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    // annual risk-free rate subtracted from the expected return in Sharpe and Sortino
    pub risk_free_rate: f64,

    // annualization factor. Variance and mean returns scale linearly, deviations by its root
    pub trading_days: f64,

    // one-tailed standard normal quantile used by the parametric VaR
    pub var_z_score: f64,

    // minimum number of dates shared by every series
    pub min_common_dates: usize,

    // allowed absolute deviation of the weight sum from 1.0
    pub weight_tolerance: f64,

    // upper bound on instruments per analysis request
    pub max_instruments: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            trading_days: DEFAULT_TRADING_DAYS,
            var_z_score: DEFAULT_VAR_Z_SCORE,
            min_common_dates: DEFAULT_MIN_COMMON_DATES,
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
            max_instruments: DEFAULT_MAX_INSTRUMENTS,
        }
    }
}

impl RiskConfig {
    /// Builder method for the `risk_free_rate` field
    pub fn with_risk_free_rate(mut self, risk_free_rate: f64) -> Self {
        self.risk_free_rate = risk_free_rate;
        self
    }

    /// Builder method for the `min_common_dates` field
    pub fn with_min_common_dates(mut self, min_common_dates: usize) -> Self {
        self.min_common_dates = min_common_dates;
        self
    }

    /// Parse and validate a configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: RiskConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a TOML file
    ///
    /// # Errors
    /// * If the file cannot be read
    /// * If the file is not valid TOML or contains unexpected types
    /// * If any value fails [`RiskConfig::validate`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject values that would make the calculations meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floats = [
            ("risk_free_rate", self.risk_free_rate),
            ("trading_days", self.trading_days),
            ("var_z_score", self.var_z_score),
            ("weight_tolerance", self.weight_tolerance),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::Invalid(format!("{} must be finite, got {}", name, value)));
        }

        if self.trading_days <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trading_days must be positive, got {}",
                self.trading_days
            )));
        }

        if self.weight_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "weight_tolerance cannot be negative, got {}",
                self.weight_tolerance
            )));
        }

        // sample covariance divides by T - 1
        if self.min_common_dates < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_common_dates must be at least 2, got {}",
                self.min_common_dates
            )));
        }

        if self.max_instruments == 0 {
            return Err(ConfigError::Invalid("max_instruments must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_temp_dir;
    use std::fs::remove_dir_all;

    #[test]
    fn test_default() {
        let config = RiskConfig::default();
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.trading_days, 252.0);
        assert_eq!(config.var_z_score, 1.645);
        assert_eq!(config.min_common_dates, 10);
        assert_eq!(config.weight_tolerance, 0.01);
        assert_eq!(config.max_instruments, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RiskConfig::from_toml_str("risk_free_rate = 0.035\nmin_common_dates = 60").unwrap();
        assert_eq!(config.risk_free_rate, 0.035);
        assert_eq!(config.min_common_dates, 60);
        assert_eq!(config.trading_days, DEFAULT_TRADING_DAYS);
        assert_eq!(config.var_z_score, DEFAULT_VAR_Z_SCORE);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = RiskConfig::from_toml_str("min_common_dates = 1");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = RiskConfig::from_toml_str("trading_days = 0.0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = RiskConfig::from_toml_str("max_instruments = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = RiskConfig::default().with_risk_free_rate(f64::NAN);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = RiskConfig::from_toml_str("risk_free_rate = \"two percent\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load() {
        let path = create_temp_dir(Path::new("risk_config_testing"));
        let file_path = path.join("risk.toml");
        fs::write(&file_path, "var_z_score = 2.326\n").unwrap();

        let config = RiskConfig::load(&file_path).unwrap();
        assert_eq!(config.var_z_score, 2.326);

        let missing = RiskConfig::load(&path.join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        remove_dir_all(&path).unwrap();
    }
}
