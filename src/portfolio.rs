//! Portfolio specification and recommendation records

use crate::error::{AnalyticsError, AnalyticsResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default allowed deviation of the weight sum from 1.0
pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 1e-3;

/// Validated set of tickers, weights and as-of date
///
/// Fields are private so a constructed spec always satisfies the
/// invariants: non-empty unique tickers, one weight per ticker in [0, 1],
/// weights summing to 1 within tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSpec {
    tickers: Vec<String>,
    weights: Vec<f64>,
    as_of: NaiveDate,
}

impl PortfolioSpec {
    /// Build a spec using the default weight tolerance
    ///
    /// # Example
    ///
    /// ```
    /// use ag_portfolio::PortfolioSpec;
    /// use chrono::NaiveDate;
    ///
    /// let as_of = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    /// let spec = PortfolioSpec::new(
    ///     vec!["VTI".to_string(), "BND".to_string()],
    ///     vec![0.6, 0.4],
    ///     as_of,
    /// ).unwrap();
    /// assert_eq!(spec.tickers().len(), 2);
    ///
    /// // Weights summing to 1.1 are rejected
    /// assert!(PortfolioSpec::new(
    ///     vec!["A".to_string(), "B".to_string()],
    ///     vec![0.5, 0.6],
    ///     as_of,
    /// ).is_err());
    /// ```
    pub fn new(tickers: Vec<String>, weights: Vec<f64>, as_of: NaiveDate) -> AnalyticsResult<Self> {
        Self::with_tolerance(tickers, weights, as_of, DEFAULT_WEIGHT_TOLERANCE)
    }

    /// Build a spec with an explicit weight-sum tolerance
    pub fn with_tolerance(
        tickers: Vec<String>,
        weights: Vec<f64>,
        as_of: NaiveDate,
        tolerance: f64,
    ) -> AnalyticsResult<Self> {
        validate_weights(&tickers, &weights, tolerance)?;
        Ok(Self {
            tickers,
            weights,
            as_of,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Same holdings with a different as-of date
    pub fn with_as_of(&self, as_of: NaiveDate) -> Self {
        Self {
            as_of,
            ..self.clone()
        }
    }

    /// `(ticker, weight)` pairs in order
    pub fn allocations(&self) -> impl Iterator<Item = (&str, f64)> {
        self.tickers
            .iter()
            .map(|t| t.as_str())
            .zip(self.weights.iter().copied())
    }
}

/// Check ticker/weight consistency
pub fn validate_weights(
    tickers: &[String],
    weights: &[f64],
    tolerance: f64,
) -> AnalyticsResult<()> {
    if tickers.is_empty() {
        return Err(AnalyticsError::InvalidPortfolio(
            "portfolio has no tickers".to_string(),
        ));
    }

    if tickers.len() != weights.len() {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "{} tickers but {} weights",
            tickers.len(),
            weights.len()
        )));
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    for ticker in tickers {
        if ticker.trim().is_empty() {
            return Err(AnalyticsError::InvalidPortfolio(
                "empty ticker symbol".to_string(),
            ));
        }
        if !seen.insert(ticker.as_str()) {
            return Err(AnalyticsError::InvalidPortfolio(format!(
                "duplicate ticker {}",
                ticker
            )));
        }
    }

    if let Some((ticker, weight)) = tickers
        .iter()
        .zip(weights)
        .find(|(_, w)| !(**w >= 0.0 && **w <= 1.0))
    {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "weight {} for {} is outside [0, 1]",
            weight, ticker
        )));
    }

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > tolerance {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "weights sum to {:.6}, expected 1.0",
            sum
        )));
    }

    Ok(())
}

/// Stored recommendation as supplied by the recommendation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Store-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Owner of the recommendation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub tickers: Vec<String>,

    pub weights: Vec<f64>,

    /// When the recommendation was produced
    pub timestamp: DateTime<Utc>,
}

impl Recommendation {
    /// Convert into a spec whose as-of date is the recommendation's calendar date
    pub fn to_spec(&self, tolerance: f64) -> AnalyticsResult<PortfolioSpec> {
        PortfolioSpec::with_tolerance(
            self.tickers.clone(),
            self.weights.clone(),
            self.timestamp.date_naive(),
            tolerance,
        )
    }
}

impl TryFrom<&Recommendation> for PortfolioSpec {
    type Error = AnalyticsError;

    fn try_from(rec: &Recommendation) -> AnalyticsResult<Self> {
        rec.to_spec(DEFAULT_WEIGHT_TOLERANCE)
    }
}
