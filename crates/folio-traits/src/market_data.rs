//! Market data source traits.
//!
//! These traits define interfaces for the data the engine consumes:
//! - [`MarketDataProvider`]: Price histories of the requested assets
//! - [`BenchmarkProvider`]: Price history of a benchmark for relative metrics
//!
//! Providers are snapshot sources: every call returns the full history for
//! the requested window. Failures surface to callers as
//! `MARKET_DATA_UNAVAILABLE`.

use std::sync::Arc;

use async_trait::async_trait;
use folio_portfolio::{AssetSeries, LookbackWindow};
use serde::{Deserialize, Serialize};

use crate::error::TraitError;

/// Source type for market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// Snapshot/request-response (REST APIs, vendor snapshots)
    Snapshot,
    /// File-based (CSV)
    File,
    /// Database (for historical/EOD)
    Database,
    /// Held in process memory
    Memory,
}

// =============================================================================
// PRICE HISTORY
// =============================================================================

/// Trait for price history providers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Source type.
    fn source_type(&self) -> SourceType;

    /// Fetches one series per requested symbol, restricted to `window`.
    ///
    /// A symbol the source does not know is an error, not an omission.
    async fn fetch_series(
        &self,
        symbols: &[String],
        window: Option<&LookbackWindow>,
    ) -> Result<Vec<AssetSeries>, TraitError>;
}

// =============================================================================
// BENCHMARK
// =============================================================================

/// Trait for benchmark history providers.
#[async_trait]
pub trait BenchmarkProvider: Send + Sync {
    /// Fetches the benchmark series, restricted to `window`.
    async fn fetch_benchmark(
        &self,
        symbol: &str,
        window: Option<&LookbackWindow>,
    ) -> Result<AssetSeries, TraitError>;
}

// =============================================================================
// COMPOSITE MARKET DATA SOURCES
// =============================================================================

/// Combined market data sources (concrete struct holding all providers).
#[derive(Clone)]
pub struct MarketDataSources {
    /// Price history source
    pub series: Arc<dyn MarketDataProvider>,
    /// Benchmark source; benchmark metrics are skipped when absent
    pub benchmarks: Option<Arc<dyn BenchmarkProvider>>,
}

impl MarketDataSources {
    /// Sources without a benchmark provider.
    pub fn new(series: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            series,
            benchmarks: None,
        }
    }

    /// Adds a benchmark provider.
    #[must_use]
    pub fn with_benchmarks(mut self, benchmarks: Arc<dyn BenchmarkProvider>) -> Self {
        self.benchmarks = Some(benchmarks);
        self
    }

    /// Uses one source for both roles.
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: MarketDataProvider + BenchmarkProvider + 'static,
    {
        Self {
            series: source.clone(),
            benchmarks: Some(source),
        }
    }
}

impl std::fmt::Debug for MarketDataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataSources")
            .field("series", &self.series.source_type())
            .field("benchmarks", &self.benchmarks.is_some())
            .finish()
    }
}
