//! Error types for the analytics engine

use thiserror::Error;

/// Errors raised by the analytics engine
///
/// Computational modules return the first five variants for bad inputs.
/// `NoMarketData` is only produced by the orchestrator.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Malformed portfolio input (length mismatch, bad weights, non-positive investment)
    #[error("Invalid portfolio: {0}")]
    InvalidPortfolio(String),

    /// A series has no points at all
    #[error("Empty series: {0}")]
    EmptySeries(String),

    /// A series has too few points for the requested computation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A cost basis or price is zero, negative, non-finite or missing
    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),

    /// Beta cannot be computed (benchmark variance is zero)
    #[error("Undefined beta: {0}")]
    UndefinedBeta(String),

    /// The market data provider returned nothing usable
    #[error("No market data: {0}")]
    NoMarketData(String),

    /// Configuration or simulation parameter out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// True for errors that mean the market data was unavailable, as opposed
    /// to a caller passing inconsistent inputs
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, AnalyticsError::NoMarketData(_))
    }
}

/// Result type for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
