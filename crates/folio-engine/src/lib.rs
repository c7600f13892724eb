//! # Folio Engine
//!
//! Request dispatcher for the Folio optimizers.
//!
//! This crate provides:
//! - [`OptimizationEngine`]: Validates requests, fetches market data and runs solves
//! - [`SingleFlightCache`]: TTL result cache with one computation per key
//! - [`WorkerPool`]: Fixed-size solver pool with admission control
//! - [`CacheKey`]: Canonical request identity
//! - [`Clock`]: Injected time source ([`SystemClock`], [`ManualClock`])
//!
//! ## Architecture
//!
//! ```text
//! request ─> validate ─> CacheKey ─┬─> hit ─────────────────────────────> Arc<result>
//!                                  │
//!                                  └─> single-flight ─> MarketDataProvider
//!                                                      │
//!                                                      └─> WorkerPool: preprocess ─> compile ─> solve ─> analytics
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let engine = OptimizationEngineBuilder::new()
//!     .with_config(EngineConfig::from_file("folio.toml")?)
//!     .with_sources(MarketDataSources::from_source(Arc::new(data)))
//!     .build()?;
//!
//! let request = OptimizationRequest::new(["AAPL", "MSFT"], OptimizationMethod::MinVolatility);
//! let result = engine.optimize(&request).await?;
//! engine.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod cache;
pub mod clock;
pub mod engine;
pub mod error;
pub mod key;
pub mod pool;
pub mod shutdown;
pub mod stats;

// Re-exports
pub use builder::OptimizationEngineBuilder;
pub use cache::{Lookup, SingleFlightCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::OptimizationEngine;
pub use error::EngineResult;
pub use key::CacheKey;
pub use pool::{PendingJob, WorkerPool};
pub use shutdown::GracefulShutdown;
pub use stats::{EngineStats, StatsSnapshot};
