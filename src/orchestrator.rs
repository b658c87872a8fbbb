//! Analytics orchestration
//!
//! Composes the provider, alignment, performance, metrics and Monte Carlo
//! modules into the two user-facing requests:
//!
//! - **Live tracking**: value of a recommendation since its as-of date
//! - **Backtest + forecast**: trailing risk metrics plus a forward projection
//!
//! Every request receives the portfolio spec and the current date as
//! arguments; the orchestrator keeps no per-request state.

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::metrics::{cumulative_returns, MetricParams, RiskMetrics};
use crate::monte_carlo::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator};
use crate::performance::{
    holdings_breakdown, point_in_time_change, total_return, track_aligned, Holding,
    PointInTimeChange, TotalReturn,
};
use crate::portfolio::PortfolioSpec;
use crate::provider::MarketDataProvider;
use crate::returns::{normalize_all, portfolio_returns_from_prices, returns};
use crate::series::{
    AlignedPrices, DatedSeries, PriceHistory, PriceSeries, ReturnSeries, ValueSeries,
};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of a live tracking request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveTrackingReport {
    pub as_of: NaiveDate,
    pub end: NaiveDate,
    /// Calendar days between the as-of date and `end`
    pub elapsed_days: i64,
    pub values: ValueSeries,
    pub shares: Vec<(String, f64)>,
    pub change: PointInTimeChange,
    pub total_return: TotalReturn,
    pub holdings: Vec<Holding>,
    /// False until there are at least two valuation dates
    pub has_growth_curve: bool,
}

/// Result of a backtest + forecast request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Normalized price path per ticker
    pub normalized: BTreeMap<String, PriceSeries>,
    /// Cumulative growth curve of the portfolio returns
    pub cumulative: DatedSeries,
    pub metrics: RiskMetrics,
    pub forecast: MonteCarloResult,
}

/// Runs analytics requests against a market data provider
pub struct AnalyticsOrchestrator<P> {
    provider: P,
    config: AnalyticsConfig,
}

impl<P: MarketDataProvider> AnalyticsOrchestrator<P> {
    pub fn new(provider: P, config: AnalyticsConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Track the portfolio from its as-of date to `today`
    pub async fn live_tracking(
        &self,
        spec: &PortfolioSpec,
        today: NaiveDate,
    ) -> AnalyticsResult<LiveTrackingReport> {
        self.config.validate()?;
        let start = spec.as_of();
        if today < start {
            return Err(AnalyticsError::InvalidPortfolio(format!(
                "as-of date {} is after {}",
                start, today
            )));
        }

        tracing::info!(
            tickers = ?spec.tickers(),
            as_of = %start,
            "Running live tracking"
        );

        let history = self.fetch(spec.tickers(), spec.tickers(), start, today).await?;
        require_all(&history, spec.tickers())?;
        let aligned = AlignedPrices::align(&history, spec.tickers())?;

        let initial = self.config.initial_investment;
        let tracked = track_aligned(&aligned, spec.weights(), initial)?;
        let change = point_in_time_change(&tracked.values, initial)?;
        let total_return = total_return(&tracked.values, initial)?;
        let holdings = holdings_breakdown(&tracked);

        tracing::info!(
            current_value = change.current,
            total_return_pct = total_return.pct,
            points = tracked.values.len(),
            "Live tracking complete"
        );

        Ok(LiveTrackingReport {
            as_of: start,
            end: today,
            elapsed_days: (today - start).num_days(),
            has_growth_curve: tracked.values.len() >= 2,
            values: tracked.values,
            shares: tracked.shares,
            change,
            total_return,
            holdings,
        })
    }

    /// Backtest the holdings over the trailing window and project forward
    ///
    /// The portfolio's as-of date is ignored: the window always ends at `today`.
    pub async fn backtest_and_forecast<R: Rng + ?Sized>(
        &self,
        spec: &PortfolioSpec,
        today: NaiveDate,
        rng: &mut R,
    ) -> AnalyticsResult<BacktestReport> {
        self.config.validate()?;
        let lookback = Duration::days(365 * self.config.backtest_years as i64);
        let start = today.checked_sub_signed(lookback).ok_or_else(|| {
            AnalyticsError::InvalidConfig(format!(
                "backtest_years {} reaches before the earliest supported date",
                self.config.backtest_years
            ))
        })?;
        let benchmark = self.config.benchmark_symbol.clone();

        let mut symbols = spec.tickers().to_vec();
        if !symbols.contains(&benchmark) {
            symbols.push(benchmark.clone());
        }

        tracing::info!(
            tickers = ?spec.tickers(),
            benchmark = %benchmark,
            start = %start,
            end = %today,
            "Running backtest"
        );

        let history = self.fetch(&symbols, spec.tickers(), start, today).await?;
        require_all(&history, spec.tickers())?;

        let aligned = AlignedPrices::align(&history, spec.tickers())?;
        let normalized = normalize_all(&aligned)?;
        let portfolio_returns = portfolio_returns_from_prices(&aligned, spec.weights())?;

        let benchmark_returns = benchmark_returns(&aligned, &history, &benchmark)?;

        let params = MetricParams {
            years_span: self.config.backtest_years as f64,
            risk_free_rate: self.config.risk_free_rate,
            trading_days_per_year: self.config.trading_days_per_year,
        };
        let metrics =
            RiskMetrics::compute(&portfolio_returns, benchmark_returns.as_ref(), &params)?;

        let returns_vec = portfolio_returns.values();
        let curve = cumulative_returns(&returns_vec);
        let dates: Vec<NaiveDate> = portfolio_returns.dates().collect();
        let cumulative = DatedSeries::from_parts(&dates, &curve)?;

        let simulator = MonteCarloSimulator::new(MonteCarloConfig {
            path_count: self.config.monte_carlo.path_count,
            horizon_years: self.config.monte_carlo.horizon_years,
            trading_days_per_year: self.config.trading_days_per_year,
            initial_investment: self.config.initial_investment,
        });
        let forecast = simulator.run(&returns_vec, rng)?;

        tracing::info!(
            total_return = metrics.total_return,
            sharpe = metrics.sharpe_ratio,
            max_drawdown = metrics.max_drawdown,
            beta = ?metrics.beta,
            median_projection = forecast.percentiles.p50,
            "Backtest complete"
        );

        Ok(BacktestReport {
            start,
            end: today,
            normalized,
            cumulative,
            metrics,
            forecast,
        })
    }

    /// Fetch prices, turning provider failures and empty results into `NoMarketData`
    ///
    /// `required` are the portfolio tickers; a history without any of them
    /// counts as empty even when the benchmark came back.
    async fn fetch(
        &self,
        symbols: &[String],
        required: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalyticsResult<PriceHistory> {
        let history = self
            .provider
            .fetch(symbols, start, end)
            .await
            .map_err(|e| {
                tracing::error!(provider = self.provider.id(), error = %e, "Price fetch failed");
                AnalyticsError::NoMarketData(e.to_string())
            })?;

        if history.is_empty() || !history.has_any(required) {
            return Err(AnalyticsError::NoMarketData(format!(
                "provider {} returned no prices for {:?} between {} and {}",
                self.provider.id(),
                required,
                start,
                end
            )));
        }

        Ok(history)
    }

    /// Backtest using the configured seed, or entropy when none is set
    pub async fn backtest_with_config_seed(
        &self,
        spec: &PortfolioSpec,
        today: NaiveDate,
    ) -> AnalyticsResult<BacktestReport> {
        let mut rng = match self.config.monte_carlo.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.backtest_and_forecast(spec, today, &mut rng).await
    }
}

/// Fail with every portfolio ticker the history lacks
fn require_all(history: &PriceHistory, tickers: &[String]) -> AnalyticsResult<()> {
    let missing = history.missing(tickers);
    if missing.is_empty() {
        return Ok(());
    }
    Err(AnalyticsError::InvalidPriceData(format!(
        "no price history for {}",
        missing.join(", ")
    )))
}

/// Benchmark returns on the portfolio's forward-filled date index
///
/// None when the benchmark is absent or covers fewer than two aligned dates.
fn benchmark_returns(
    aligned: &AlignedPrices,
    history: &PriceHistory,
    benchmark: &str,
) -> AnalyticsResult<Option<ReturnSeries>> {
    let Some(series) = history.get(benchmark) else {
        tracing::warn!(benchmark = %benchmark, "No benchmark prices, beta omitted");
        return Ok(None);
    };

    match returns(&aligned.reindex(series)?) {
        Ok(r) => Ok(Some(r)),
        Err(AnalyticsError::InsufficientData(reason)) => {
            tracing::warn!(
                benchmark = %benchmark,
                reason = %reason,
                "Benchmark too short, beta omitted"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, ProviderError};
    use async_trait::async_trait;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    struct FailingProvider;

    #[async_trait]
    impl MarketDataProvider for FailingProvider {
        fn id(&self) -> &'static str {
            "FAILING"
        }

        async fn fetch(
            &self,
            _tickers: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceHistory, ProviderError> {
            Err(ProviderError::Timeout {
                provider: "FAILING".to_string(),
                message: "gave up".to_string(),
            })
        }
    }

    fn small_config() -> AnalyticsConfig {
        let mut config = AnalyticsConfig::default();
        config.monte_carlo.path_count = 50;
        config.monte_carlo.horizon_years = 1;
        config
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_no_market_data() {
        let orchestrator = AnalyticsOrchestrator::new(FailingProvider, small_config());
        let spec = PortfolioSpec::new(tickers(&["AAA"]), vec![1.0], d(2024, 1, 2)).unwrap();

        let err = orchestrator.live_tracking(&spec, d(2024, 1, 10)).await.unwrap_err();
        assert!(err.is_data_unavailable());

        let mut rng = StdRng::seed_from_u64(1);
        let err = orchestrator
            .backtest_and_forecast(&spec, d(2024, 1, 10), &mut rng)
            .await
            .unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn test_empty_history_becomes_no_market_data() {
        let orchestrator = AnalyticsOrchestrator::new(InMemoryProvider::default(), small_config());
        let spec =
            PortfolioSpec::new(tickers(&["AAA", "BBB"]), vec![0.5, 0.5], d(2024, 1, 2)).unwrap();

        let err = orchestrator.live_tracking(&spec, d(2024, 1, 10)).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::NoMarketData(_)));
    }

    #[tokio::test]
    async fn test_as_of_in_future_rejected() {
        let orchestrator = AnalyticsOrchestrator::new(InMemoryProvider::default(), small_config());
        let spec = PortfolioSpec::new(tickers(&["AAA"]), vec![1.0], d(2024, 2, 1)).unwrap();

        let err = orchestrator.live_tracking(&spec, d(2024, 1, 1)).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidPortfolio(_)));
    }

    #[tokio::test]
    async fn test_lookback_before_calendar_start_is_config_error() {
        let mut config = small_config();
        config.backtest_years = 400_000;
        let orchestrator = AnalyticsOrchestrator::new(InMemoryProvider::default(), config);
        let spec = PortfolioSpec::new(tickers(&["AAA"]), vec![1.0], d(2024, 1, 2)).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let err = orchestrator
            .backtest_and_forecast(&spec, d(2024, 1, 10), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig(_)));
    }

    #[test]
    fn test_require_all_lists_every_missing_ticker() {
        let mut history = PriceHistory::new();
        history.insert(
            "AAA",
            DatedSeries::new(vec![(d(2024, 1, 2), 10.0)]).unwrap(),
        );

        let err = require_all(&history, &tickers(&["AAA", "XXX", "YYY"])).unwrap_err();
        match err {
            AnalyticsError::InvalidPriceData(msg) => {
                assert!(msg.contains("XXX") && msg.contains("YYY"));
                assert!(!msg.contains("AAA"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(require_all(&history, &tickers(&["AAA"])).is_ok());
    }
}
