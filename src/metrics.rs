//! Risk and performance metrics
//!
//! Implements the backtest statistics:
//! - Cumulative return curve: running product of `1 + r`
//! - Annualized return over a fixed analysis horizon
//! - Annualized volatility: sample standard deviation × √(trading days)
//! - Sharpe ratio: (annualized return - risk-free rate) / volatility
//! - Maximum drawdown: largest peak-to-trough decline of the curve
//! - Beta: Covariance(portfolio, benchmark) / Variance(benchmark)
//!
//! Every function is pure and works on plain slices or dated series.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::series::ReturnSeries;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Cumulative growth curve `cum[t] = Π_{k<=t} (1 + r[k])`
///
/// The curve starts at `1 + r[0]`, not at 1.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Total return implied by a cumulative curve (`cum[last] - 1`)
pub fn total_return_from_curve(cumulative: &[f64]) -> AnalyticsResult<f64> {
    cumulative
        .last()
        .map(|last| last - 1.0)
        .ok_or_else(|| AnalyticsError::InsufficientData("cumulative curve is empty".to_string()))
}

/// Annualize a cumulative growth factor over a fixed horizon
///
/// `years_span` is the nominal length of the analysis window (5.0 for a
/// 5-year backtest), not the span actually covered by the data. A shorter
/// price history is still annualized over the full horizon.
pub fn annualized_return(cumulative_last: f64, years_span: f64) -> AnalyticsResult<f64> {
    if !(years_span > 0.0) {
        return Err(AnalyticsError::InvalidConfig(format!(
            "years span must be positive, got {}",
            years_span
        )));
    }
    Ok(cumulative_last.powf(1.0 / years_span) - 1.0)
}

/// Sample standard deviation of returns, annualized
///
/// Fewer than two returns carry no variance information and yield 0.
pub fn annualized_volatility(returns: &[f64], trading_days_per_year: u32) -> f64 {
    sample_std_dev(returns) * (trading_days_per_year as f64).sqrt()
}

/// Sharpe ratio, defined as 0 when volatility is 0
pub fn sharpe_ratio(
    annualized_return: f64,
    annualized_volatility: f64,
    risk_free_rate: f64,
) -> f64 {
    if annualized_volatility == 0.0 {
        return 0.0;
    }
    (annualized_return - risk_free_rate) / annualized_volatility
}

/// Largest relative decline from a running peak of the cumulative curve
///
/// Always ≤ 0. A single-point curve has no drawdown.
///
/// # Example
///
/// ```
/// use ag_portfolio::metrics::max_drawdown;
///
/// let dd = max_drawdown(&[1.0, 1.2, 0.9, 1.1]).unwrap();
/// assert!((dd + 0.25).abs() < 1e-12);
/// ```
pub fn max_drawdown(cumulative: &[f64]) -> AnalyticsResult<f64> {
    let first = *cumulative
        .first()
        .ok_or_else(|| AnalyticsError::InsufficientData("cumulative curve is empty".to_string()))?;

    let mut peak = first;
    let mut max_dd: f64 = 0.0;
    for &value in cumulative {
        if value > peak {
            peak = value;
        }
        let drawdown = (value - peak) / peak;
        if drawdown < max_dd {
            max_dd = drawdown;
        }
    }

    Ok(max_dd)
}

/// Beta of the portfolio against the benchmark over their common dates
pub fn beta(portfolio: &ReturnSeries, benchmark: &ReturnSeries) -> AnalyticsResult<f64> {
    let (p, b): (Vec<f64>, Vec<f64>) = portfolio
        .points()
        .iter()
        .filter_map(|(date, r)| benchmark.get(*date).map(|m| (*r, m)))
        .unzip();

    beta_aligned(&p, &b)
}

/// Beta of two return slices already on the same index
pub fn beta_aligned(portfolio: &[f64], benchmark: &[f64]) -> AnalyticsResult<f64> {
    if portfolio.len() != benchmark.len() {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "portfolio has {} returns, benchmark {}",
            portfolio.len(),
            benchmark.len()
        )));
    }
    if benchmark.len() < 2 {
        return Err(AnalyticsError::UndefinedBeta(format!(
            "need at least 2 common returns, got {}",
            benchmark.len()
        )));
    }

    let port_mean = portfolio.mean();
    let market_mean = benchmark.mean();
    let n = (benchmark.len() - 1) as f64;

    let market_variance: f64 = benchmark
        .iter()
        .map(|m| (m - market_mean).powi(2))
        .sum::<f64>()
        / n;
    if market_variance == 0.0 || !market_variance.is_finite() {
        return Err(AnalyticsError::UndefinedBeta(
            "benchmark variance is zero".to_string(),
        ));
    }

    let covariance: f64 = portfolio
        .iter()
        .zip(benchmark)
        .map(|(p, m)| (p - port_mean) * (m - market_mean))
        .sum::<f64>()
        / n;

    Ok(covariance / market_variance)
}

/// Sample mean, 0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Sample standard deviation (two-pass), 0 below two observations
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.mean();
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Parameters shared by the metric calculations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricParams {
    /// Nominal horizon used to annualize the cumulative return
    pub years_span: f64,
    pub risk_free_rate: f64,
    pub trading_days_per_year: u32,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            years_span: 5.0,
            risk_free_rate: 0.02,
            trading_days_per_year: 252,
        }
    }
}

/// Backtest statistics for one portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    /// Non-positive fraction
    pub max_drawdown: f64,
    /// None when no benchmark was supplied or its variance is zero
    pub beta: Option<f64>,
}

impl RiskMetrics {
    /// Compute the full bundle from portfolio (and optional benchmark) returns
    ///
    /// An undefined beta is reported as `None`; every other failure is returned.
    pub fn compute(
        portfolio: &ReturnSeries,
        benchmark: Option<&ReturnSeries>,
        params: &MetricParams,
    ) -> AnalyticsResult<Self> {
        let r = portfolio.values();
        if r.is_empty() {
            return Err(AnalyticsError::InsufficientData(
                "portfolio return series is empty".to_string(),
            ));
        }

        let curve = cumulative_returns(&r);
        let total_return = total_return_from_curve(&curve)?;
        let annualized_return = annualized_return(total_return + 1.0, params.years_span)?;
        let annualized_volatility = annualized_volatility(&r, params.trading_days_per_year);
        let sharpe_ratio =
            sharpe_ratio(annualized_return, annualized_volatility, params.risk_free_rate);
        let max_drawdown = max_drawdown(&curve)?;

        let beta = match benchmark {
            Some(b) => match beta(portfolio, b) {
                Ok(value) => Some(value),
                Err(AnalyticsError::UndefinedBeta(reason)) => {
                    tracing::warn!(reason = %reason, "Beta undefined, omitting from metrics");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(Self {
            total_return,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown,
            beta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DatedSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    /// Daily returns of an index closing at these levels
    fn benchmark_returns() -> Vec<f64> {
        let closes = [
            4769.8, 4742.8, 4704.8, 4688.7, 4697.2, 4763.5, 4756.5,
            4783.5, 4780.2, 4783.8, 4765.9, 4739.2, 4780.9, 4839.8,
            4850.4, 4864.6, 4868.6, 4894.2, 4890.9, 4927.9, 4924.0,
        ];
        closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
    }

    /// Higher-beta holding: 1.3x the index plus an alternating residual
    fn holding_returns() -> Vec<f64> {
        benchmark_returns()
            .iter()
            .enumerate()
            .map(|(i, m)| 1.3 * m + if i % 2 == 0 { 0.002 } else { -0.0015 })
            .collect()
    }

    fn dated(values: &[f64], offset: i64) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let dates: Vec<NaiveDate> = (0..values.len())
            .map(|i| start + chrono::Duration::days(i as i64 + offset))
            .collect();
        DatedSeries::from_parts(&dates, values).unwrap()
    }

    #[test]
    fn test_cumulative_returns() {
        let curve = cumulative_returns(&[0.1, -0.1, 0.05]);
        assert_relative_eq!(curve[0], 1.1, epsilon = 1e-12);
        assert_relative_eq!(curve[1], 0.99, epsilon = 1e-12);
        assert_relative_eq!(curve[2], 1.0395, epsilon = 1e-12);
    }

    #[test]
    fn test_annualized_return_fixed_span() {
        // 61.051% over five years is 10% a year
        let ann = annualized_return(1.61051, 5.0).unwrap();
        assert_relative_eq!(ann, 0.10, epsilon = 1e-9);

        assert!(annualized_return(1.1, 0.0).is_err());
    }

    #[test]
    fn test_annualized_volatility() {
        let vol = annualized_volatility(&[0.01, -0.01, 0.01, -0.01], 252);
        // sample std of ±0.01 alternating, n = 4: sqrt(4 * 0.0001 / 3)
        let expected = (4.0 * 0.0001_f64 / 3.0).sqrt() * 252f64.sqrt();
        assert_relative_eq!(vol, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_volatility_of_constant_returns_is_zero() {
        assert_eq!(annualized_volatility(&[0.0; 10], 252), 0.0);
        assert_eq!(annualized_volatility(&[0.03], 252), 0.0);
        assert_eq!(annualized_volatility(&[], 252), 0.0);
    }

    #[test]
    fn test_sharpe_ratio() {
        assert_relative_eq!(sharpe_ratio(0.12, 0.2, 0.02), 0.5, epsilon = 1e-12);
        assert_eq!(sharpe_ratio(0.12, 0.0, 0.02), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let curve = cumulative_returns(&[0.10, 0.05, -0.20, -0.10, 0.15, 0.05]);
        let dd = max_drawdown(&curve).unwrap();
        // peak 1.155, trough 1.155 * 0.8 * 0.9
        assert_relative_eq!(dd, 0.8 * 0.9 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_drawdown_edge_cases() {
        assert_eq!(max_drawdown(&[1.05]).unwrap(), 0.0);
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.1, 1.3]).unwrap(), 0.0);
        assert!(max_drawdown(&[]).is_err());
    }

    #[test]
    fn test_beta_against_itself() {
        let market = dated(&benchmark_returns(), 0);
        let b = beta(&market, &market).unwrap();
        assert_relative_eq!(b, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_beta_correlated() {
        let b = beta_aligned(&holding_returns(), &benchmark_returns()).unwrap();
        assert!(b > 0.5 && b < 2.0);
    }

    #[test]
    fn test_beta_scaled_portfolio() {
        let market = benchmark_returns();
        let levered: Vec<f64> = market.iter().map(|m| 2.0 * m).collect();
        let b = beta_aligned(&levered, &market).unwrap();
        assert_relative_eq!(b, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_beta_uses_common_dates() {
        let portfolio = dated(&holding_returns(), 0);
        let shifted = dated(&benchmark_returns(), 5);
        let b = beta(&portfolio, &shifted).unwrap();

        let expected =
            beta_aligned(&holding_returns()[5..], &benchmark_returns()[..15]).unwrap();
        assert_relative_eq!(b, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_beta_zero_benchmark_variance() {
        let err = beta_aligned(&[0.01, 0.02, 0.03], &[0.01, 0.01, 0.01]).unwrap_err();
        assert!(matches!(err, AnalyticsError::UndefinedBeta(_)));
    }

    #[test]
    fn test_risk_metrics_bundle() {
        let portfolio = dated(&holding_returns(), 0);
        let market = dated(&benchmark_returns(), 0);
        let metrics =
            RiskMetrics::compute(&portfolio, Some(&market), &MetricParams::default()).unwrap();

        let curve = cumulative_returns(&holding_returns());
        assert_relative_eq!(metrics.total_return, curve[curve.len() - 1] - 1.0, epsilon = 1e-12);
        assert!(metrics.annualized_volatility > 0.0);
        assert!(metrics.max_drawdown <= 0.0);
        assert!(metrics.beta.is_some());
    }

    #[test]
    fn test_risk_metrics_constant_benchmark() {
        let portfolio = dated(&holding_returns(), 0);
        let flat = dated(&[0.0; 20], 0);
        let metrics =
            RiskMetrics::compute(&portfolio, Some(&flat), &MetricParams::default()).unwrap();
        assert!(metrics.beta.is_none());
    }

    #[test]
    fn test_risk_metrics_zero_variance_portfolio() {
        let portfolio = dated(&[0.0; 10], 0);
        let metrics = RiskMetrics::compute(&portfolio, None, &MetricParams::default()).unwrap();

        assert_eq!(metrics.total_return, 0.0);
        assert_eq!(metrics.annualized_volatility, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }
}
