//! Builder pattern for the optimization engine.

use std::sync::Arc;

use folio_config::{EngineConfig, Validate};
use folio_portfolio::OptimizerError;
use folio_traits::{BenchmarkProvider, MarketDataProvider, MarketDataSources};

use crate::clock::{Clock, SystemClock};
use crate::engine::OptimizationEngine;
use crate::error::{config_error, EngineResult};

/// Builder for constructing an [`OptimizationEngine`].
#[derive(Default)]
pub struct OptimizationEngineBuilder {
    config: Option<EngineConfig>,
    market_data: Option<Arc<dyn MarketDataProvider>>,
    benchmarks: Option<Arc<dyn BenchmarkProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl OptimizationEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the price history provider.
    #[must_use]
    pub fn with_market_data(mut self, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.market_data = Some(provider);
        self
    }

    /// Set the benchmark provider.
    #[must_use]
    pub fn with_benchmarks(mut self, provider: Arc<dyn BenchmarkProvider>) -> Self {
        self.benchmarks = Some(provider);
        self
    }

    /// Set both providers at once.
    #[must_use]
    pub fn with_sources(mut self, sources: MarketDataSources) -> Self {
        self.market_data = Some(sources.series);
        self.benchmarks = sources.benchmarks;
        self
    }

    /// Set the time source used for result expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and start the engine.
    ///
    /// The background cache sweeper only runs when this is called inside a
    /// Tokio runtime.
    pub fn build(self) -> EngineResult<OptimizationEngine> {
        let config = self.config.unwrap_or_default();
        config.validate_or_error().map_err(config_error)?;

        let sources = match (self.market_data, self.benchmarks) {
            (Some(series), benchmarks) => Some(MarketDataSources { series, benchmarks }),
            (None, Some(_)) => {
                return Err(OptimizerError::invalid_request(
                    "benchmark provider configured without a market data provider",
                ))
            }
            (None, None) => None,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        OptimizationEngine::start(config, sources, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_portfolio::ErrorCode;
    use folio_traits::InMemoryMarketData;

    #[tokio::test]
    async fn test_build_with_defaults() {
        let engine = OptimizationEngineBuilder::new().build().unwrap();
        assert_eq!(engine.config(), &EngineConfig::default());
        assert_eq!(engine.cached_results(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = OptimizationEngineBuilder::new()
            .with_config(EngineConfig::default().with_max_queue_depth(0))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_benchmarks_require_market_data() {
        let err = OptimizationEngineBuilder::new()
            .with_benchmarks(Arc::new(InMemoryMarketData::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_build_outside_runtime() {
        let data = Arc::new(InMemoryMarketData::new());
        let engine = OptimizationEngineBuilder::new()
            .with_sources(MarketDataSources::from_source(data))
            .build();
        assert!(engine.is_ok());
    }
}
