//! Error types for trait operations.

use thiserror::Error;

/// Failure of a market data source.
///
/// Every variant reaches engine callers as `MARKET_DATA_UNAVAILABLE`.
#[derive(Debug, Clone, Error)]
pub enum TraitError {
    /// The source has no history for the symbol
    #[error("no price history for {0}")]
    NotFound(String),

    /// The source cannot be opened
    #[error("source not available: {0}")]
    SourceNotAvailable(String),

    /// A record could not be read
    #[error("parse error: {0}")]
    ParseError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TraitError {
    fn from(e: std::io::Error) -> Self {
        TraitError::IoError(e.to_string())
    }
}

impl From<TraitError> for folio_portfolio::OptimizerError {
    fn from(e: TraitError) -> Self {
        folio_portfolio::OptimizerError::market_data(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_portfolio::{ErrorCode, OptimizerError};

    #[test]
    fn test_maps_to_market_data_unavailable() {
        let err: OptimizerError = TraitError::NotFound("TSLA".into()).into();
        assert_eq!(err.code(), ErrorCode::MarketDataUnavailable);
        assert!(err.to_string().contains("TSLA"));
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "prices.csv");
        assert!(matches!(TraitError::from(io), TraitError::IoError(_)));
    }
}
