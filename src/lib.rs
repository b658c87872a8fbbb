//! # ag-portfolio: Portfolio Performance & Risk Analytics
//!
//! Analytics for a fixed-weight, buy-and-hold stock portfolio built from a
//! recommendation (tickers, weights, as-of date).
//!
//! ## Core Components
//!
//! - **Returns**: price normalization, daily returns, weighted portfolio returns
//! - **Performance**: value tracking since inception, period change, holdings
//! - **Metrics**: total/annualized return, volatility, Sharpe, drawdown, beta
//! - **MonteCarloSimulator**: forward projection of portfolio value
//! - **AnalyticsOrchestrator**: live tracking and backtest + forecast requests
//! - **MarketDataProvider**: async boundary for daily price history
//!
//! ## Example Usage
//!
//! ```rust
//! use ag_portfolio::{returns, track_value, DatedSeries, PortfolioSpec, PriceHistory};
//! use ag_portfolio::metrics::{cumulative_returns, max_drawdown};
//! use chrono::NaiveDate;
//!
//! let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
//! let spec = PortfolioSpec::new(
//!     vec!["AAA".to_string(), "BBB".to_string()],
//!     vec![0.6, 0.4],
//!     d(2),
//! )
//! .unwrap();
//!
//! let mut history = PriceHistory::new();
//! let aaa = DatedSeries::new(vec![(d(2), 50.0), (d(3), 55.0), (d(4), 52.0)]).unwrap();
//! let bbb = DatedSeries::new(vec![(d(2), 20.0), (d(3), 19.0), (d(4), 21.0)]).unwrap();
//! history.insert("AAA", aaa);
//! history.insert("BBB", bbb);
//!
//! let tracked = track_value(&history, spec.tickers(), spec.weights(), 10_000.0).unwrap();
//! assert_eq!(tracked.values.len(), 3);
//!
//! let daily = returns(history.get("AAA").unwrap()).unwrap();
//! let curve = cumulative_returns(&daily.values());
//! assert!(max_drawdown(&curve).unwrap() < 0.0);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod monte_carlo;
pub mod orchestrator;
pub mod performance;
pub mod portfolio;
pub mod provider;
pub mod returns;
pub mod series;

pub use config::{AnalyticsConfig, MonteCarloSettings, RetryConfig};
pub use error::{AnalyticsError, AnalyticsResult};
pub use metrics::{MetricParams, RiskMetrics};
pub use monte_carlo::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator, PercentileSummary};
pub use orchestrator::{AnalyticsOrchestrator, BacktestReport, LiveTrackingReport};
pub use performance::{
    holdings_breakdown, point_in_time_change, total_return, track_aligned, track_value, Holding,
    PointInTimeChange, TotalReturn, TrackedValue,
};
pub use portfolio::{validate_weights, PortfolioSpec, Recommendation, DEFAULT_WEIGHT_TOLERANCE};
pub use provider::{InMemoryProvider, MarketDataProvider, ProviderError, RetryingProvider};
pub use returns::{
    normalize, normalize_all, portfolio_returns, portfolio_returns_from_prices, returns,
};
pub use series::{AlignedPrices, DatedSeries, PriceHistory, PriceSeries, ReturnSeries, ValueSeries};
