//! # Folio Ext File
//!
//! File-based market data for the Folio optimization engine.
//!
//! This crate provides default implementations for testing, EOD loads and
//! the command-line front end:
//! - CSV price histories in long format (`date,symbol,price`)
//! - Optional CSV asset metadata (`symbol,sector,esg_score,liquidity_score`)
//!
//! For live market data, implement the `folio-traits` provider traits
//! against the vendor directly.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod market_data;

pub use market_data::*;

use std::path::Path;
use std::sync::Arc;

use folio_traits::error::TraitError;
use folio_traits::market_data::MarketDataSources;

/// Create file-based market data sources.
///
/// The same CSV source serves both asset and benchmark histories, so a
/// benchmark symbol only needs to appear in the price file.
pub fn create_file_market_data(
    prices_csv: impl AsRef<Path>,
    metadata_csv: Option<&Path>,
) -> Result<MarketDataSources, TraitError> {
    let mut source = CsvPriceSource::new(prices_csv)?;
    if let Some(path) = metadata_csv {
        source = source.with_metadata(path)?;
    }
    Ok(MarketDataSources::from_source(Arc::new(source)))
}
