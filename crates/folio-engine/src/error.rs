//! Engine error types.
//!
//! The engine reports the same taxonomy as the optimizers, so callers match
//! on one [`ErrorCode`](folio_portfolio::ErrorCode) regardless of where a
//! request failed.

use folio_config::ConfigError;
use folio_portfolio::{OptimizerError, OptimizerResult};

/// Result type for engine operations.
pub type EngineResult<T> = OptimizerResult<T>;

/// Maps a rejected engine configuration to `INVALID_REQUEST`.
pub fn config_error(err: ConfigError) -> OptimizerError {
    OptimizerError::invalid_request(format!("invalid engine configuration: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_portfolio::ErrorCode;

    #[test]
    fn test_config_error_is_invalid_request() {
        let err = config_error(ConfigError::NotFound {
            key: "pool".into(),
        });
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert!(err.to_string().contains("pool"));
    }
}
