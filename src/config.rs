//! Analytics configuration
//!
//! Every field has a default so a partial YAML/JSON document (or none at all)
//! yields a usable configuration.

use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete analytics engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Benchmark symbol used for beta (fetched with the portfolio tickers)
    #[serde(default = "default_benchmark_symbol")]
    pub benchmark_symbol: String,

    /// Annual risk-free rate used by the Sharpe ratio
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Trading days per year used for annualization
    #[serde(default = "default_trading_days_per_year")]
    pub trading_days_per_year: u32,

    /// Trailing window of the historical backtest, in years
    #[serde(default = "default_backtest_years")]
    pub backtest_years: u32,

    /// Hypothetical starting capital in base currency
    #[serde(default = "default_initial_investment")]
    pub initial_investment: f64,

    /// Allowed deviation of the weight sum from 1.0
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,

    /// Monte Carlo projection settings
    #[serde(default)]
    pub monte_carlo: MonteCarloSettings,

    /// Retry policy applied around the market data provider
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Monte Carlo projection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSettings {
    /// Number of simulated paths
    #[serde(default = "default_path_count")]
    pub path_count: usize,

    /// Projection horizon in years
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,

    /// Upper bound on `path_count`, keeps interactive requests bounded
    #[serde(default = "default_max_path_count")]
    pub max_path_count: usize,

    /// Upper bound on `horizon_years`
    #[serde(default = "default_max_horizon_years")]
    pub max_horizon_years: u32,

    /// Random seed for reproducible projections (None = seeded from entropy)
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Bounded exponential backoff around provider calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Multiplier applied to the delay after every failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay to wait after the given zero-based failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((self.initial_backoff_ms as f64 * factor).round() as u64)
    }
}

impl AnalyticsConfig {
    /// Parse configuration from a YAML string
    ///
    /// # Example
    ///
    /// ```
    /// use ag_portfolio::AnalyticsConfig;
    ///
    /// let yaml = r#"
    /// benchmark_symbol: QQQ
    /// monte_carlo:
    ///   path_count: 500
    /// "#;
    ///
    /// let config = AnalyticsConfig::from_yaml(yaml).unwrap();
    /// assert_eq!(config.benchmark_symbol, "QQQ");
    /// assert_eq!(config.monte_carlo.path_count, 500);
    /// assert_eq!(config.monte_carlo.horizon_years, 10);
    /// ```
    pub fn from_yaml(yaml: &str) -> AnalyticsResult<Self> {
        let config: AnalyticsConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> AnalyticsResult<Self> {
        let config: AnalyticsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, choosing the format by extension
    pub fn load(path: &Path) -> AnalyticsResult<Self> {
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Check that all parameters are in range
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.benchmark_symbol.trim().is_empty() {
            return Err(AnalyticsError::InvalidConfig(
                "benchmark_symbol must not be empty".to_string(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(AnalyticsError::InvalidConfig(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        if self.trading_days_per_year == 0 || self.trading_days_per_year > 366 {
            return Err(AnalyticsError::InvalidConfig(format!(
                "trading_days_per_year must be in 1..=366, got {}",
                self.trading_days_per_year
            )));
        }
        if self.backtest_years == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "backtest_years must be positive".to_string(),
            ));
        }
        if !(self.initial_investment > 0.0 && self.initial_investment.is_finite()) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "initial_investment must be positive, got {}",
                self.initial_investment
            )));
        }
        if !(self.weight_tolerance >= 0.0 && self.weight_tolerance < 1.0) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "weight_tolerance must be in [0, 1), got {}",
                self.weight_tolerance
            )));
        }

        let mc = &self.monte_carlo;
        if mc.path_count == 0 || mc.horizon_years == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "monte_carlo path_count and horizon_years must be positive".to_string(),
            ));
        }
        if mc.horizon_years > mc.max_horizon_years {
            return Err(AnalyticsError::InvalidConfig(format!(
                "monte_carlo horizon_years {} exceeds max_horizon_years {}",
                mc.horizon_years, mc.max_horizon_years
            )));
        }
        if mc.path_count > mc.max_path_count {
            return Err(AnalyticsError::InvalidConfig(format!(
                "monte_carlo path_count {} exceeds max_path_count {}",
                mc.path_count, mc.max_path_count
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(AnalyticsError::InvalidConfig(
                "retry backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

// Default value functions
fn default_benchmark_symbol() -> String {
    "SPY".to_string()
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_trading_days_per_year() -> u32 {
    252
}

fn default_backtest_years() -> u32 {
    5
}

fn default_initial_investment() -> f64 {
    10_000.0
}

fn default_weight_tolerance() -> f64 {
    1e-3
}

fn default_path_count() -> usize {
    1000
}

fn default_horizon_years() -> u32 {
    10
}

fn default_max_path_count() -> usize {
    100_000
}

fn default_max_horizon_years() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            benchmark_symbol: default_benchmark_symbol(),
            risk_free_rate: default_risk_free_rate(),
            trading_days_per_year: default_trading_days_per_year(),
            backtest_years: default_backtest_years(),
            initial_investment: default_initial_investment(),
            weight_tolerance: default_weight_tolerance(),
            monte_carlo: MonteCarloSettings::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            path_count: default_path_count(),
            horizon_years: default_horizon_years(),
            max_path_count: default_max_path_count(),
            max_horizon_years: default_max_horizon_years(),
            random_seed: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}
