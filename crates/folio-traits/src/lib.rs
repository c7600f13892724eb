//! # Folio Traits
//!
//! Trait definitions for the Folio optimization engine.
//!
//! The engine never talks to a data vendor directly. Price histories and
//! benchmark series arrive through the traits defined here; concrete
//! sources live in extension crates (`folio-ext-file`) or, for tests and
//! embedding, in [`memory::InMemoryMarketData`].
//!
//! ## Module Structure
//!
//! - [`market_data`]: Traits for price history and benchmark sources
//! - [`memory`]: In-memory implementation of both traits
//! - [`error`]: Error type shared by all providers
//!
//! ## Dependency Injection
//!
//! The engine uses these traits via dependency injection:
//!
//! ```ignore
//! OptimizationEngineBuilder::new()
//!     .with_market_data(Arc::new(impl MarketDataProvider))
//!     .with_benchmarks(Arc::new(impl BenchmarkProvider))
//!     .build()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod market_data;
pub mod memory;

// Re-export commonly used types
pub use error::TraitError;
pub use market_data::{BenchmarkProvider, MarketDataProvider, MarketDataSources, SourceType};
pub use memory::InMemoryMarketData;
