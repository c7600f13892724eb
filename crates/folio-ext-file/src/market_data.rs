//! File-based market data sources.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use folio_portfolio::{AssetMetadata, AssetSeries, LookbackWindow, PricePoint};
use folio_traits::error::TraitError;
use folio_traits::market_data::*;

// =============================================================================
// CSV PRICE SOURCE
// =============================================================================

/// CSV record for prices.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    symbol: String,
    price: f64,
}

/// CSV record for asset metadata.
#[derive(Debug, Deserialize)]
struct MetadataRecord {
    symbol: String,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    esg_score: Option<f64>,
    #[serde(default)]
    liquidity_score: Option<f64>,
}

/// CSV-based price history source for testing/EOD.
///
/// Prices are read in long format, one observation per row. Rows may come
/// in any order; each series is sorted by date on load.
pub struct CsvPriceSource {
    file_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
    series: DashMap<String, AssetSeries>,
}

impl CsvPriceSource {
    /// Create a new CSV price source.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let file_path = file_path.as_ref().to_path_buf();
        if !file_path.exists() {
            return Err(TraitError::SourceNotAvailable(format!(
                "price file {} does not exist",
                file_path.display()
            )));
        }
        let source = Self {
            file_path: Some(file_path),
            metadata_path: None,
            series: DashMap::new(),
        };
        source.reload()?;
        Ok(source)
    }

    /// Create a source from in-memory CSV content.
    pub fn from_reader(reader: impl Read) -> Result<Self, TraitError> {
        let source = Self {
            file_path: None,
            metadata_path: None,
            series: DashMap::new(),
        };
        source.load_prices(csv::Reader::from_reader(reader))?;
        Ok(source)
    }

    /// Attach a metadata file; a missing file leaves metadata empty.
    pub fn with_metadata(mut self, metadata_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let path = metadata_path.as_ref().to_path_buf();
        self.apply_metadata(&path)?;
        self.metadata_path = Some(path);
        Ok(self)
    }

    /// Reload prices (and metadata, when attached) from file.
    pub fn reload(&self) -> Result<(), TraitError> {
        if let Some(path) = &self.file_path {
            let reader =
                csv::Reader::from_path(path).map_err(|e| TraitError::IoError(e.to_string()))?;
            self.load_prices(reader)?;
        }
        if let Some(path) = &self.metadata_path {
            self.apply_metadata(path)?;
        }
        Ok(())
    }

    /// Symbols currently loaded, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    fn load_prices<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<(), TraitError> {
        let mut grouped: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
        for result in reader.deserialize() {
            let record: PriceRecord = result.map_err(|e| TraitError::ParseError(e.to_string()))?;
            grouped
                .entry(record.symbol.trim().to_string())
                .or_default()
                .push(PricePoint::new(record.date, record.price));
        }

        self.series.retain(|symbol, _| grouped.contains_key(symbol));
        for (symbol, mut prices) in grouped {
            prices.sort_by_key(|p| p.date);
            let metadata = self
                .series
                .get(&symbol)
                .map(|s| s.metadata.clone())
                .unwrap_or_else(|| AssetMetadata::new(symbol.clone()));
            debug!(symbol = %symbol, observations = prices.len(), "loaded price series");
            self.series.insert(symbol, AssetSeries { metadata, prices });
        }
        Ok(())
    }

    fn apply_metadata(&self, path: &Path) -> Result<(), TraitError> {
        if !path.exists() {
            return Ok(()); // No metadata
        }

        let mut reader =
            csv::Reader::from_path(path).map_err(|e| TraitError::IoError(e.to_string()))?;
        for result in reader.deserialize() {
            let record: MetadataRecord =
                result.map_err(|e| TraitError::ParseError(e.to_string()))?;
            if let Some(mut series) = self.series.get_mut(record.symbol.trim()) {
                series.metadata.sector = record.sector.filter(|s| !s.trim().is_empty());
                series.metadata.esg_score = record.esg_score;
                series.metadata.liquidity_score = record.liquidity_score;
            }
        }
        Ok(())
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
impl MarketDataProvider for CsvPriceSource {
    fn source_type(&self) -> SourceType {
        SourceType::File
    }

    async fn fetch_series(
        &self,
        symbols: &[String],
        window: Option<&LookbackWindow>,
    ) -> Result<Vec<AssetSeries>, TraitError> {
        symbols.iter().map(|s| self.lookup(s, window)).collect()
    }
}

#[async_trait]
impl BenchmarkProvider for CsvPriceSource {
    async fn fetch_benchmark(
        &self,
        symbol: &str,
        window: Option<&LookbackWindow>,
    ) -> Result<AssetSeries, TraitError> {
        self.lookup(symbol, window)
    }
}
