//! Dated numeric series and price history alignment
//!
//! Every series in the engine is an ordered list of `(date, value)` pairs
//! with strictly increasing dates. Alignment onto a shared date index uses
//! forward fill only.

use crate::error::{AnalyticsError, AnalyticsResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered `(date, value)` pairs with strictly increasing dates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<(NaiveDate, f64)>", into = "Vec<(NaiveDate, f64)>")]
pub struct DatedSeries {
    points: Vec<(NaiveDate, f64)>,
}

/// Daily adjusted close prices
pub type PriceSeries = DatedSeries;

/// Simple period returns
pub type ReturnSeries = DatedSeries;

/// Portfolio value in base currency
pub type ValueSeries = DatedSeries;

impl DatedSeries {
    /// Build a series, rejecting dates that are not strictly increasing
    ///
    /// # Example
    ///
    /// ```
    /// use ag_portfolio::DatedSeries;
    /// use chrono::NaiveDate;
    ///
    /// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    /// let series = DatedSeries::new(vec![(d(2), 100.0), (d(3), 101.0)]).unwrap();
    /// assert_eq!(series.len(), 2);
    ///
    /// assert!(DatedSeries::new(vec![(d(3), 100.0), (d(2), 101.0)]).is_err());
    /// ```
    pub fn new(points: Vec<(NaiveDate, f64)>) -> AnalyticsResult<Self> {
        if let Some(pair) = points.windows(2).find(|w| w[0].0 >= w[1].0) {
            return Err(AnalyticsError::InvalidPriceData(format!(
                "series dates must be strictly increasing ({} followed by {})",
                pair[0].0, pair[1].0
            )));
        }
        Ok(Self { points })
    }

    /// Build a series from parallel date and value vectors
    pub fn from_parts(dates: &[NaiveDate], values: &[f64]) -> AnalyticsResult<Self> {
        if dates.len() != values.len() {
            return Err(AnalyticsError::InsufficientData(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Self::new(dates.iter().copied().zip(values.iter().copied()).collect())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|(d, _)| *d)
    }

    /// Values in date order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points.last().copied()
    }

    /// Value recorded exactly on `date`
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|idx| self.points[idx].1)
    }

    /// Sub-series with dates in `[start, end]`
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|(d, _)| *d >= start && *d <= end)
                .copied()
                .collect(),
        }
    }

    /// Apply `f` to every value, keeping the dates
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            points: self.points.iter().map(|(d, v)| (*d, f(*v))).collect(),
        }
    }
}

impl TryFrom<Vec<(NaiveDate, f64)>> for DatedSeries {
    type Error = AnalyticsError;

    fn try_from(points: Vec<(NaiveDate, f64)>) -> AnalyticsResult<Self> {
        Self::new(points)
    }
}

impl From<DatedSeries> for Vec<(NaiveDate, f64)> {
    fn from(series: DatedSeries) -> Self {
        series.points
    }
}

/// Price series per symbol, as returned by a market data provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    series: BTreeMap<String, PriceSeries>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, series: PriceSeries) {
        self.series.insert(symbol.into(), series);
    }

    /// Series for `symbol`, if the provider returned any points for it
    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol).filter(|s| !s.is_empty())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    /// True when no symbol has a single price point
    pub fn is_empty(&self) -> bool {
        self.series.values().all(|s| s.is_empty())
    }

    /// True when at least one of `symbols` has data
    pub fn has_any(&self, symbols: &[String]) -> bool {
        symbols.iter().any(|s| self.get(s).is_some())
    }

    /// Requested symbols with no data
    pub fn missing<'a>(&self, symbols: &'a [String]) -> Vec<&'a str> {
        symbols
            .iter()
            .filter(|s| self.get(s).is_none())
            .map(|s| s.as_str())
            .collect()
    }

    /// Restrict every series to `[start, end]`
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            series: self
                .series
                .iter()
                .map(|(symbol, s)| (symbol.clone(), s.window(start, end)))
                .collect(),
        }
    }
}

impl FromIterator<(String, PriceSeries)> for PriceHistory {
    fn from_iter<I: IntoIterator<Item = (String, PriceSeries)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

/// Prices for several symbols on one shared, forward-filled date index
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPrices {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    /// One column per symbol, each `dates.len()` long
    columns: Vec<Vec<f64>>,
}

impl AlignedPrices {
    /// Align `symbols` from `history` onto the union of their dates
    ///
    /// Each symbol is forward-filled from its last known price. The window
    /// starts at the first date on which every symbol has a price, so no
    /// value is ever back-filled.
    pub fn align(history: &PriceHistory, symbols: &[String]) -> AnalyticsResult<Self> {
        if symbols.is_empty() {
            return Err(AnalyticsError::InvalidPortfolio(
                "no symbols to align".to_string(),
            ));
        }

        let mut sources = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let series = history.get(symbol).ok_or_else(|| {
                AnalyticsError::InvalidPriceData(format!("no price data for {}", symbol))
            })?;
            sources.push(series);
        }

        let index: BTreeSet<NaiveDate> = sources.iter().flat_map(|s| s.dates()).collect();
        let start = sources
            .iter()
            .filter_map(|s| s.first().map(|(d, _)| d))
            .max()
            .ok_or_else(|| AnalyticsError::EmptySeries("aligned window".to_string()))?;
        let dates: Vec<NaiveDate> = index.into_iter().filter(|d| *d >= start).collect();

        let columns = sources
            .iter()
            .map(|series| forward_fill(series, &dates))
            .collect::<AnalyticsResult<Vec<_>>>()?;

        Ok(Self {
            dates,
            symbols: symbols.to_vec(),
            columns,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Price column for a symbol
    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Price columns in symbol order
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// A symbol's aligned prices as a dated series
    pub fn series(&self, symbol: &str) -> Option<PriceSeries> {
        self.column(symbol).map(|values| DatedSeries {
            points: self.dates.iter().copied().zip(values.iter().copied()).collect(),
        })
    }

    /// Forward-fill an outside series (e.g. a benchmark) onto this date index
    ///
    /// Aligned dates before the series' first price are left out.
    pub fn reindex(&self, series: &PriceSeries) -> AnalyticsResult<PriceSeries> {
        let Some((first, _)) = series.first() else {
            return Ok(DatedSeries::default());
        };
        let dates: Vec<NaiveDate> = self.dates.iter().copied().filter(|d| *d >= first).collect();
        let values = forward_fill(series, &dates)?;
        DatedSeries::from_parts(&dates, &values)
    }
}

/// Sample `series` on `dates`, carrying the last known price forward
///
/// The first target date must not precede the series' first point.
fn forward_fill(series: &PriceSeries, dates: &[NaiveDate]) -> AnalyticsResult<Vec<f64>> {
    let points = series.points();
    let mut out = Vec::with_capacity(dates.len());
    let mut cursor = 0;
    let mut last: Option<f64> = None;

    for date in dates {
        while cursor < points.len() && points[cursor].0 <= *date {
            last = Some(points[cursor].1);
            cursor += 1;
        }
        match last {
            Some(price) => out.push(price),
            None => {
                return Err(AnalyticsError::InvalidPriceData(format!(
                    "no price on or before {}",
                    date
                )))
            }
        }
    }

    Ok(out)
}
