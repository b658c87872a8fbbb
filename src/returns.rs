//! Price normalization and return series
//!
//! - `normalize`: price path relative to the first price
//! - `returns`: simple period returns `p[t] / p[t-1] - 1`
//! - `portfolio_returns`: weighted sum of asset returns on common dates

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::series::{AlignedPrices, DatedSeries, PriceSeries, ReturnSeries};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};

/// Divide every price by the first price in the series
pub fn normalize(prices: &PriceSeries) -> AnalyticsResult<PriceSeries> {
    let (date, base) = prices
        .first()
        .ok_or_else(|| {
            AnalyticsError::EmptySeries("cannot normalize an empty series".to_string())
        })?;

    if base == 0.0 || !base.is_finite() {
        return Err(AnalyticsError::InvalidPriceData(format!(
            "first price {} on {} cannot be used as a base",
            base, date
        )));
    }

    Ok(prices.map_values(|p| p / base))
}

/// Normalized price path for every aligned symbol, in symbol order
pub fn normalize_all(aligned: &AlignedPrices) -> AnalyticsResult<BTreeMap<String, PriceSeries>> {
    aligned
        .symbols()
        .iter()
        .map(|symbol| {
            let series = aligned.series(symbol).ok_or_else(|| {
                AnalyticsError::InvalidPriceData(format!("no aligned prices for {}", symbol))
            })?;
            Ok((symbol.clone(), normalize(&series)?))
        })
        .collect()
}

/// Simple period returns, dated by the later of each pair of prices
///
/// # Example
///
/// ```
/// use ag_portfolio::{returns, DatedSeries};
/// use chrono::NaiveDate;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
/// let prices = DatedSeries::new(vec![(d(2), 100.0), (d(3), 110.0), (d(4), 99.0)]).unwrap();
/// let r = returns(&prices).unwrap();
///
/// assert_eq!(r.len(), 2);
/// assert!((r.values()[0] - 0.10).abs() < 1e-12);
/// assert!((r.values()[1] + 0.10).abs() < 1e-12);
/// ```
pub fn returns(prices: &PriceSeries) -> AnalyticsResult<ReturnSeries> {
    if prices.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "need at least 2 prices for returns, got {}",
            prices.len()
        )));
    }

    let points = prices.points();
    let mut out = Vec::with_capacity(points.len() - 1);
    for pair in points.windows(2) {
        let (_, prev) = pair[0];
        let (date, price) = pair[1];
        if prev == 0.0 || !prev.is_finite() {
            return Err(AnalyticsError::InvalidPriceData(format!(
                "price {} before {} cannot be used as a return base",
                prev, date
            )));
        }
        out.push((date, price / prev - 1.0));
    }

    DatedSeries::new(out)
}

/// Weighted portfolio returns over the intersection of asset dates
///
/// `asset_returns` and `weights` are matched by position. Dates missing from
/// any asset are dropped for all assets.
pub fn portfolio_returns(
    asset_returns: &[(String, ReturnSeries)],
    weights: &[f64],
) -> AnalyticsResult<ReturnSeries> {
    if asset_returns.len() != weights.len() {
        return Err(AnalyticsError::InvalidPortfolio(format!(
            "{} return series but {} weights",
            asset_returns.len(),
            weights.len()
        )));
    }
    if asset_returns.is_empty() {
        return Err(AnalyticsError::InvalidPortfolio(
            "no assets in portfolio".to_string(),
        ));
    }

    let common = common_dates(asset_returns.iter().map(|(_, r)| r));

    // rows = dates, columns = assets
    let mut matrix = DMatrix::<f64>::zeros(common.len(), asset_returns.len());
    for (col, (ticker, series)) in asset_returns.iter().enumerate() {
        for (row, date) in common.iter().enumerate() {
            matrix[(row, col)] = series.get(*date).ok_or_else(|| {
                AnalyticsError::InsufficientData(format!("{} has no return on {}", ticker, date))
            })?;
        }
    }

    let w = DVector::from_column_slice(weights);
    let weighted = &matrix * &w;

    DatedSeries::from_parts(&common, weighted.as_slice())
}

/// Portfolio returns straight from aligned prices
pub fn portfolio_returns_from_prices(
    aligned: &AlignedPrices,
    weights: &[f64],
) -> AnalyticsResult<ReturnSeries> {
    let per_asset = aligned
        .symbols()
        .iter()
        .map(|symbol| {
            let prices = aligned.series(symbol).ok_or_else(|| {
                AnalyticsError::InvalidPriceData(format!("no aligned prices for {}", symbol))
            })?;
            Ok((symbol.clone(), returns(&prices)?))
        })
        .collect::<AnalyticsResult<Vec<_>>>()?;

    portfolio_returns(&per_asset, weights)
}

fn common_dates<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a ReturnSeries>,
{
    let mut iter = series.into_iter();
    let mut common: BTreeSet<NaiveDate> = match iter.next() {
        Some(first) => first.dates().collect(),
        None => return Vec::new(),
    };
    for s in iter {
        let dates: BTreeSet<NaiveDate> = s.dates().collect();
        common = common.intersection(&dates).copied().collect();
    }
    common.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::PriceHistory;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> DatedSeries {
        DatedSeries::new(points.iter().map(|(day, v)| (d(*day), *v)).collect()).unwrap()
    }

    #[test]
    fn test_normalize() {
        let n = normalize(&series(&[(1, 50.0), (2, 55.0), (3, 45.0)])).unwrap();
        assert_eq!(n.values(), vec![1.0, 1.1, 0.9]);
        assert_eq!(n.first().unwrap().0, d(1));
    }

    #[test]
    fn test_normalize_empty() {
        let err = normalize(&DatedSeries::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptySeries(_)));
    }

    #[test]
    fn test_normalize_zero_base() {
        let err = normalize(&series(&[(1, 0.0), (2, 1.0)])).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidPriceData(_)));
    }

    #[test]
    fn test_returns() {
        let r = returns(&series(&[(1, 100.0), (2, 110.0), (3, 121.0)])).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.dates().collect::<Vec<_>>(), vec![d(2), d(3)]);
        assert_relative_eq!(r.values()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(r.values()[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_returns_single_point() {
        let err = returns(&series(&[(1, 100.0)])).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn test_portfolio_returns_weighted() {
        let a = series(&[(2, 0.10), (3, 0.00)]);
        let b = series(&[(2, -0.10), (3, 0.02)]);
        let r = portfolio_returns(
            &[("AAA".to_string(), a), ("BBB".to_string(), b)],
            &[0.5, 0.5],
        )
        .unwrap();

        assert_relative_eq!(r.values()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r.values()[1], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_portfolio_returns_inner_join() {
        let a = series(&[(2, 0.01), (3, 0.02), (4, 0.03)]);
        let b = series(&[(3, 0.04), (4, 0.05), (5, 0.06)]);
        let r = portfolio_returns(
            &[("AAA".to_string(), a), ("BBB".to_string(), b)],
            &[0.25, 0.75],
        )
        .unwrap();

        assert_eq!(r.dates().collect::<Vec<_>>(), vec![d(3), d(4)]);
        assert_relative_eq!(r.values()[0], 0.25 * 0.02 + 0.75 * 0.04, epsilon = 1e-12);
        assert_relative_eq!(r.values()[1], 0.25 * 0.03 + 0.75 * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_portfolio_returns_mismatch() {
        let a = series(&[(2, 0.01)]);
        let err = portfolio_returns(&[("AAA".to_string(), a)], &[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidPortfolio(_)));
    }

    #[test]
    fn test_from_aligned_prices() {
        let mut history = PriceHistory::new();
        history.insert("AAA", series(&[(1, 100.0), (2, 110.0)]));
        history.insert("BBB", series(&[(1, 100.0), (2, 90.0)]));
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        let aligned = AlignedPrices::align(&history, &symbols).unwrap();

        let r = portfolio_returns_from_prices(&aligned, &[0.5, 0.5]).unwrap();
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r.values()[0], 0.0, epsilon = 1e-12);

        let normalized = normalize_all(&aligned).unwrap();
        assert_relative_eq!(normalized["AAA"].values()[1], 1.1, epsilon = 1e-12);
        assert_relative_eq!(normalized["BBB"].values()[1], 0.9, epsilon = 1e-12);
    }
}
