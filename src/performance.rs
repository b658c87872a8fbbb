//! Buy-and-hold portfolio value tracking
//!
//! Shares are bought once at the start of the window
//! (`initial * weight / first price`) and never rebalanced.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::series::{AlignedPrices, DatedSeries, PriceHistory, ValueSeries};
use serde::{Deserialize, Serialize};

/// Value series plus the fixed share count per ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedValue {
    /// Portfolio value on every aligned date
    pub values: ValueSeries,

    /// Shares held per ticker, in portfolio order
    pub shares: Vec<(String, f64)>,

    /// Last aligned price per ticker, in portfolio order
    pub last_prices: Vec<(String, f64)>,
}

/// Latest period change of the portfolio value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointInTimeChange {
    pub current: f64,
    pub previous_period: f64,
    pub delta: f64,
    /// Fraction of `previous_period` (0.0537 = 5.37%)
    pub delta_pct: f64,
}

/// Gain since inception
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalReturn {
    pub value: f64,
    pub pct: f64,
}

/// Current value and weight of one holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
    pub current_value: f64,
    pub current_weight: f64,
}

/// Track a buy-and-hold portfolio through `history`
///
/// The cost basis of each ticker is its first price in the aligned,
/// forward-filled window.
///
/// # Example
///
/// ```
/// use ag_portfolio::{track_value, DatedSeries, PriceHistory};
/// use chrono::NaiveDate;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
/// let mut history = PriceHistory::new();
/// history.insert("AAA", DatedSeries::new(vec![(d(2), 100.0), (d(3), 110.0)]).unwrap());
/// history.insert("BBB", DatedSeries::new(vec![(d(2), 100.0), (d(3), 90.0)]).unwrap());
///
/// let tickers = vec!["AAA".to_string(), "BBB".to_string()];
/// let tracked = track_value(&history, &tickers, &[0.5, 0.5], 10_000.0).unwrap();
///
/// let values = tracked.values.values();
/// assert!((values[0] - 10_000.0).abs() < 1e-9);
/// assert!((values[1] - 10_000.0).abs() < 1e-9);
/// ```
pub fn track_value(
    history: &PriceHistory,
    tickers: &[String],
    weights: &[f64],
    initial_investment: f64,
) -> AnalyticsResult<TrackedValue> {
    check_investment(initial_investment)?;
    if tickers.len() != weights.len() {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "{} tickers but {} weights",
            tickers.len(),
            weights.len()
        )));
    }

    let aligned = AlignedPrices::align(history, tickers)?;
    track_aligned(&aligned, weights, initial_investment)
}

/// Track a portfolio over prices that are already aligned
pub fn track_aligned(
    aligned: &AlignedPrices,
    weights: &[f64],
    initial_investment: f64,
) -> AnalyticsResult<TrackedValue> {
    check_investment(initial_investment)?;
    if aligned.symbols().len() != weights.len() {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "{} tickers but {} weights",
            aligned.symbols().len(),
            weights.len()
        )));
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut last_prices = Vec::with_capacity(weights.len());
    for ((ticker, column), weight) in aligned.symbols().iter().zip(aligned.columns()).zip(weights) {
        let basis = column.first().copied().ok_or_else(|| {
            AnalyticsError::InvalidPriceData(format!("no cost basis price for {}", ticker))
        })?;
        if !(basis > 0.0 && basis.is_finite()) {
            return Err(AnalyticsError::InvalidPriceData(format!(
                "cost basis for {} is {}",
                ticker, basis
            )));
        }
        shares.push((ticker.clone(), initial_investment * weight / basis));
        last_prices.push((ticker.clone(), column[column.len() - 1]));
    }

    let values: Vec<f64> = (0..aligned.len())
        .map(|row| {
            shares
                .iter()
                .zip(aligned.columns())
                .map(|((_, count), column)| count * column[row])
                .sum()
        })
        .collect();

    Ok(TrackedValue {
        values: DatedSeries::from_parts(aligned.dates(), &values)?,
        shares,
        last_prices,
    })
}

/// Change between the last two values
///
/// A single-point series is compared against `initial_investment`, so a
/// portfolio tracked for less than one period reports a zero change.
pub fn point_in_time_change(
    values: &ValueSeries,
    initial_investment: f64,
) -> AnalyticsResult<PointInTimeChange> {
    let (_, current) = values
        .last()
        .ok_or_else(|| AnalyticsError::EmptySeries("value series is empty".to_string()))?;

    let previous_period = if values.len() >= 2 {
        values.points()[values.len() - 2].1
    } else {
        initial_investment
    };

    let delta = current - previous_period;
    let delta_pct = if previous_period != 0.0 {
        delta / previous_period
    } else {
        0.0
    };

    Ok(PointInTimeChange {
        current,
        previous_period,
        delta,
        delta_pct,
    })
}

/// Gain of the last value over the initial investment
pub fn total_return(values: &ValueSeries, initial_investment: f64) -> AnalyticsResult<TotalReturn> {
    check_investment(initial_investment)?;
    let (_, last) = values
        .last()
        .ok_or_else(|| AnalyticsError::EmptySeries("value series is empty".to_string()))?;

    let value = last - initial_investment;
    Ok(TotalReturn {
        value,
        pct: value / initial_investment,
    })
}

/// Current value and weight per holding, largest first
pub fn holdings_breakdown(tracked: &TrackedValue) -> Vec<Holding> {
    let total: f64 = tracked
        .shares
        .iter()
        .zip(&tracked.last_prices)
        .map(|((_, count), (_, price))| count * price)
        .sum();

    let mut holdings: Vec<Holding> = tracked
        .shares
        .iter()
        .zip(&tracked.last_prices)
        .map(|((ticker, count), (_, price))| {
            let current_value = count * price;
            Holding {
                ticker: ticker.clone(),
                shares: *count,
                current_value,
                current_weight: if total != 0.0 { current_value / total } else { 0.0 },
            }
        })
        .collect();

    holdings.sort_by(|a, b| b.current_value.total_cmp(&a.current_value));
    holdings
}

fn check_investment(initial_investment: f64) -> AnalyticsResult<()> {
    if !(initial_investment > 0.0 && initial_investment.is_finite()) {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "initial investment must be positive, got {}",
            initial_investment
        )));
    }
    Ok(())
}
