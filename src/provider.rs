//! Market data provider boundary
//!
//! The analytics core never performs I/O. Price history comes through the
//! [`MarketDataProvider`] trait; [`RetryingProvider`] adds bounded
//! exponential backoff around any implementation.

use crate::config::RetryConfig;
use crate::series::PriceHistory;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors reported by a market data provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Network failure
    #[error("Network error from {provider}: {message}")]
    Network { provider: String, message: String },

    /// Request timed out
    #[error("Request to {provider} timed out: {message}")]
    Timeout { provider: String, message: String },

    /// Provider rate limit hit
    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    /// Response could not be interpreted
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Provider refused the request (bad symbol list, disabled source)
    #[error("Provider {provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },
}

impl ProviderError {
    /// Check if error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimited { .. }
        )
    }
}

/// Source of daily adjusted close prices
///
/// A symbol with no data for the requested window is omitted from the
/// returned history (or mapped to an empty series); that is not an error.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &'static str;

    /// Fetch daily prices for `tickers` with dates in `[start, end]`
    async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, ProviderError>;
}

/// Provider serving a fixed price table
///
/// Used by tests and by the command-line runner, which loads the table from
/// a JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    prices: PriceHistory,
}

impl InMemoryProvider {
    pub fn new(prices: PriceHistory) -> Self {
        Self { prices }
    }

    /// Parse a `{"SYMBOL": [["YYYY-MM-DD", price], ...]}` document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    fn id(&self) -> &'static str {
        "IN_MEMORY"
    }

    async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, ProviderError> {
        Ok(tickers
            .iter()
            .filter_map(|t| self.prices.get(t).map(|s| (t.clone(), s.window(start, end))))
            .collect())
    }
}

/// Wraps a provider with bounded exponential backoff
///
/// Only retryable errors are retried; the last error is returned once
/// `max_attempts` is exhausted.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryConfig,
}

impl<P: MarketDataProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for RetryingProvider<P> {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(tickers, start, end).await {
                Ok(history) => return Ok(history),
                Err(e) if e.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    tracing::warn!(
                        provider = self.inner.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Market data fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        provider = self.inner.id(),
                        attempts = attempt + 1,
                        error = %e,
                        "Market data fetch failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DatedSeries;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn table() -> PriceHistory {
        let mut history = PriceHistory::new();
        history.insert(
            "AAA",
            DatedSeries::new(vec![(d(1), 10.0), (d(2), 11.0), (d(5), 12.0)]).unwrap(),
        );
        history
    }

    /// Fails a fixed number of times before delegating
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
        error: ProviderError,
    }

    #[async_trait]
    impl MarketDataProvider for FlakyProvider {
        fn id(&self) -> &'static str {
            "FLAKY"
        }

        async fn fetch(
            &self,
            tickers: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceHistory, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            InMemoryProvider::new(table()).fetch(tickers, start, end).await
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
        }
    }

    fn network_error() -> ProviderError {
        ProviderError::Network {
            provider: "FLAKY".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_retry_classification() {
        assert!(network_error().is_retryable());
        assert!(!ProviderError::InvalidResponse {
            provider: "X".to_string(),
            message: "bad json".to_string(),
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn test_in_memory_clips_window() {
        let provider = InMemoryProvider::new(table());
        let tickers = vec!["AAA".to_string(), "ZZZ".to_string()];
        let history = provider.fetch(&tickers, d(2), d(4)).await.unwrap();

        assert_eq!(history.get("AAA").unwrap().values(), vec![11.0]);
        assert!(history.get("ZZZ").is_none());
    }

    #[tokio::test]
    async fn test_in_memory_from_json() {
        let provider = InMemoryProvider::from_json(r#"{"SPY": [["2024-02-01", 480.5]]}"#).unwrap();
        let history = provider
            .fetch(&["SPY".to_string()], d(1), d(29))
            .await
            .unwrap();
        assert_eq!(history.get("SPY").unwrap().values(), vec![480.5]);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let flaky = FlakyProvider {
            failures: 2,
            calls: AtomicU32::new(0),
            error: network_error(),
        };
        let provider = RetryingProvider::new(flaky, fast_policy(3));

        let history = provider.fetch(&["AAA".to_string()], d(1), d(29)).await.unwrap();
        assert_eq!(history.get("AAA").unwrap().len(), 3);
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let flaky = FlakyProvider {
            failures: 10,
            calls: AtomicU32::new(0),
            error: network_error(),
        };
        let provider = RetryingProvider::new(flaky, fast_policy(3));

        let err = provider.fetch(&["AAA".to_string()], d(1), d(29)).await.unwrap_err();
        assert_eq!(err, network_error());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let flaky = FlakyProvider {
            failures: 10,
            calls: AtomicU32::new(0),
            error: ProviderError::Unavailable {
                provider: "FLAKY".to_string(),
                message: "disabled".to_string(),
            },
        };
        let provider = RetryingProvider::new(flaky, fast_policy(3));

        assert!(provider.fetch(&["AAA".to_string()], d(1), d(29)).await.is_err());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);
    }
}
