//! In-memory market data.
//!
//! Provides a simple in-memory implementation of both provider traits.
//! Useful for testing and embedding. Data is not persisted across restarts.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use folio_portfolio::{AssetSeries, LookbackWindow};

use crate::error::TraitError;
use crate::market_data::{BenchmarkProvider, MarketDataProvider, SourceType};

/// In-memory market data keyed by symbol.
///
/// Thread-safe through [`DashMap`]; series can be replaced while the engine
/// is running.
///
/// # Example
///
/// ```rust,ignore
/// let data = InMemoryMarketData::new()
///     .with_series(AssetSeries::from_daily_prices("AAPL", start, &prices));
/// assert!(data.contains("AAPL"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    series: DashMap<String, AssetSeries>,
    fetches: AtomicUsize,
}

impl InMemoryMarketData {
    /// Creates empty market data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a series, replacing any series of the same symbol.
    #[must_use]
    pub fn with_series(self, series: AssetSeries) -> Self {
        self.insert(series);
        self
    }

    /// Inserts a series, replacing any series of the same symbol.
    pub fn insert(&self, series: AssetSeries) {
        self.series.insert(series.symbol().to_string(), series);
    }

    /// Removes a symbol.
    pub fn remove(&self, symbol: &str) -> bool {
        self.series.remove(symbol).is_some()
    }

    /// Whether a symbol is present.
    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    /// Number of successful and failed fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn lookup(&self, symbol: &str, window: Option<&LookbackWindow>) -> Result<AssetSeries, TraitError> {
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| TraitError::NotFound(symbol.to_string()))?;
        Ok(match window {
            Some(w) => series.within(w),
            None => series.clone(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketData {
    fn source_type(&self) -> SourceType {
        SourceType::Memory
    }

    async fn fetch_series(
        &self,
        symbols: &[String],
        window: Option<&LookbackWindow>,
    ) -> Result<Vec<AssetSeries>, TraitError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        symbols.iter().map(|s| self.lookup(s, window)).collect()
    }
}

#[async_trait]
impl BenchmarkProvider for InMemoryMarketData {
    async fn fetch_benchmark(
        &self,
        symbol: &str,
        window: Option<&LookbackWindow>,
    ) -> Result<AssetSeries, TraitError> {
        self.lookup(symbol, window)
    }
}
