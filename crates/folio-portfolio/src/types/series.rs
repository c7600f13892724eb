//! Price histories and asset metadata.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single dated price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observation date.
    pub date: NaiveDate,
    /// Price (must be positive and finite).
    pub price: f64,
}

impl PricePoint {
    /// Creates a price point.
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Screening attributes of an asset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Asset symbol.
    pub symbol: String,
    /// Sector tag used by sector caps.
    #[serde(default)]
    pub sector: Option<String>,
    /// ESG score, higher is better.
    #[serde(default)]
    pub esg_score: Option<f64>,
    /// Liquidity score, higher is better.
    #[serde(default)]
    pub liquidity_score: Option<f64>,
}

impl AssetMetadata {
    /// Creates metadata with no sector and no scores.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Sets the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Sets the ESG score.
    #[must_use]
    pub fn with_esg_score(mut self, score: f64) -> Self {
        self.esg_score = Some(score);
        self
    }

    /// Sets the liquidity score.
    #[must_use]
    pub fn with_liquidity_score(mut self, score: f64) -> Self {
        self.liquidity_score = Some(score);
        self
    }
}

/// Historical prices of one asset plus its screening attributes.
///
/// Immutable once fetched from a market data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    /// Asset attributes (symbol, sector, scores).
    #[serde(flatten)]
    pub metadata: AssetMetadata,
    /// Observations, not necessarily sorted.
    pub prices: Vec<PricePoint>,
}

impl AssetSeries {
    /// Creates a series.
    pub fn new(symbol: impl Into<String>, prices: Vec<PricePoint>) -> Self {
        Self {
            metadata: AssetMetadata::new(symbol),
            prices,
        }
    }

    /// Creates a series of consecutive daily observations starting at `start`.
    pub fn from_daily_prices(symbol: impl Into<String>, start: NaiveDate, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(start + Duration::days(i as i64), p))
            .collect();
        Self::new(symbol, points)
    }

    /// Asset symbol.
    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// True when there are no observations.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Sets the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.metadata.sector = Some(sector.into());
        self
    }

    /// Sets the ESG score.
    #[must_use]
    pub fn with_esg_score(mut self, score: f64) -> Self {
        self.metadata.esg_score = Some(score);
        self
    }

    /// Sets the liquidity score.
    #[must_use]
    pub fn with_liquidity_score(mut self, score: f64) -> Self {
        self.metadata.liquidity_score = Some(score);
        self
    }

    /// Returns a copy restricted to `window`.
    #[must_use]
    pub fn within(&self, window: &LookbackWindow) -> Self {
        Self {
            metadata: self.metadata.clone(),
            prices: self
                .prices
                .iter()
                .filter(|p| window.contains(p.date))
                .copied()
                .collect(),
        }
    }
}

/// Inclusive date range of history used for estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LookbackWindow {
    /// First date included, unbounded when `None`.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Last date included, unbounded when `None`.
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl LookbackWindow {
    /// Creates a bounded window.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_from_daily_prices() {
        let s = AssetSeries::from_daily_prices("AAPL", d(2024, 1, 1), &[100.0, 101.0, 99.0]);
        assert_eq!(s.symbol(), "AAPL");
        assert_eq!(s.len(), 3);
        assert_eq!(s.prices[2].date, d(2024, 1, 3));
    }

    #[test]
    fn test_window() {
        let s = AssetSeries::from_daily_prices("X", d(2024, 1, 1), &[1.0, 2.0, 3.0, 4.0]);
        let w = LookbackWindow::between(d(2024, 1, 2), d(2024, 1, 3));
        let cut = s.within(&w);
        assert_eq!(cut.len(), 2);
        assert!((cut.prices[0].price - 2.0).abs() < f64::EPSILON);

        let open = LookbackWindow::default();
        assert!(open.contains(d(1990, 1, 1)));
    }

    #[test]
    fn test_series_json_is_flat() {
        let s = AssetSeries::from_daily_prices("X", d(2024, 1, 1), &[1.0]).with_sector("Tech");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["symbol"], "X");
        assert_eq!(json["sector"], "Tech");
    }
}
