//! Monte Carlo projection of portfolio value
//!
//! Daily returns are drawn i.i.d. from a normal distribution fitted to the
//! historical portfolio returns (sample mean and standard deviation). There
//! are no fat tails, no autocorrelation and no regime changes: each path is a
//! plain random walk and only its terminal value is kept.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::metrics::{mean, sample_std_dev};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of simulated paths
    pub path_count: usize,

    /// Projection horizon in years
    pub horizon_years: u32,

    /// Trading days simulated per year
    pub trading_days_per_year: u32,

    /// Starting value of every path
    pub initial_investment: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            path_count: 1000,
            horizon_years: 10,
            trading_days_per_year: 252,
            initial_investment: 10_000.0,
        }
    }
}

impl MonteCarloConfig {
    /// Number of daily draws per path
    pub fn horizon_days(&self) -> usize {
        self.horizon_years as usize * self.trading_days_per_year as usize
    }

    fn validate(&self) -> AnalyticsResult<()> {
        if self.path_count == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "path_count must be positive".to_string(),
            ));
        }
        if self.horizon_days() == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "horizon_years and trading_days_per_year must be positive".to_string(),
            ));
        }
        if i32::try_from(self.horizon_days()).is_err() {
            return Err(AnalyticsError::InvalidConfig(format!(
                "horizon of {} trading days is too long",
                self.horizon_days()
            )));
        }
        if !(self.initial_investment > 0.0 && self.initial_investment.is_finite()) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "initial_investment must be positive, got {}",
                self.initial_investment
            )));
        }
        Ok(())
    }
}

/// 5th / 50th / 95th percentile of terminal values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Distribution of simulated terminal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// One terminal value per path, in generation order
    pub terminal_values: Vec<f64>,

    pub percentiles: PercentileSummary,

    /// Mean terminal value
    pub mean_terminal_value: f64,

    /// Share of paths ending below the initial investment
    pub probability_of_loss: f64,

    /// Daily mean used for sampling
    pub daily_mean: f64,

    /// Daily standard deviation used for sampling
    pub daily_std_dev: f64,

    pub horizon_days: usize,
}

/// Monte Carlo simulator over an injected random source
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Run the simulation with a caller-supplied random source
    ///
    /// # Example
    ///
    /// ```
    /// use ag_portfolio::{MonteCarloConfig, MonteCarloSimulator};
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let sim = MonteCarloSimulator::new(MonteCarloConfig {
    ///     path_count: 200,
    ///     horizon_years: 1,
    ///     ..Default::default()
    /// });
    /// let history = vec![0.001, -0.002, 0.003, 0.0005, -0.001];
    ///
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let result = sim.run(&history, &mut rng).unwrap();
    ///
    /// assert_eq!(result.terminal_values.len(), 200);
    /// assert!(result.percentiles.p5 <= result.percentiles.p50);
    /// assert!(result.percentiles.p50 <= result.percentiles.p95);
    /// ```
    pub fn run<R: Rng + ?Sized>(
        &self,
        historical_returns: &[f64],
        rng: &mut R,
    ) -> AnalyticsResult<MonteCarloResult> {
        self.config.validate()?;
        if historical_returns.is_empty() {
            return Err(AnalyticsError::InsufficientData(
                "no historical returns to estimate from".to_string(),
            ));
        }

        let daily_mean = mean(historical_returns);
        let daily_std_dev = sample_std_dev(historical_returns);
        if !daily_mean.is_finite() || !daily_std_dev.is_finite() {
            return Err(AnalyticsError::InvalidPriceData(
                "historical returns contain non-finite values".to_string(),
            ));
        }

        let days = self.config.horizon_days();
        let initial = self.config.initial_investment;

        tracing::debug!(
            paths = self.config.path_count,
            days,
            daily_mean,
            daily_std_dev,
            "Running Monte Carlo projection"
        );

        let terminal_values: Vec<f64> = if daily_std_dev == 0.0 {
            // Every draw equals the mean, so all paths coincide
            let exponent = i32::try_from(days).map_err(|_| {
                AnalyticsError::InvalidConfig(format!("horizon of {} days is too long", days))
            })?;
            let terminal = initial * (1.0 + daily_mean).powi(exponent);
            vec![terminal; self.config.path_count]
        } else {
            let normal = Normal::new(daily_mean, daily_std_dev)
                .map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;

            (0..self.config.path_count)
                .map(|_| {
                    let growth: f64 = (0..days).map(|_| 1.0 + normal.sample(&mut *rng)).product();
                    initial * growth
                })
                .collect()
        };

        let mut sorted = terminal_values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let percentiles = PercentileSummary {
            p5: percentile_sorted(&sorted, 5.0),
            p50: percentile_sorted(&sorted, 50.0),
            p95: percentile_sorted(&sorted, 95.0),
        };

        let losses = terminal_values.iter().filter(|v| **v < initial).count();

        Ok(MonteCarloResult {
            mean_terminal_value: mean(&terminal_values),
            probability_of_loss: losses as f64 / terminal_values.len() as f64,
            terminal_values,
            percentiles,
            daily_mean,
            daily_std_dev,
            horizon_days: days,
        })
    }

    /// Run with a `StdRng` seeded from `seed`
    pub fn run_seeded(
        &self,
        historical_returns: &[f64],
        seed: u64,
    ) -> AnalyticsResult<MonteCarloResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.run(historical_returns, &mut rng)
    }
}

/// Percentile of an ascending slice by linear interpolation between ranks
///
/// Position `p / 100 * (n - 1)`; the same estimator as numpy's default.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Percentile of unsorted values
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, p)
}
