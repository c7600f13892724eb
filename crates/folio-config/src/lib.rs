//! Folio Configuration Layer
//!
//! This crate provides configuration management for the Folio optimization
//! engine. It covers the numerical parameters of a solve (preprocessing,
//! solver and risk settings) together with the engine's caching and worker
//! pool settings.
//!
//! # Features
//!
//! - **Analytics Configuration**: Return convention, shrinkage, solver tolerances, VaR confidence
//! - **Cache Configuration**: Result TTL and background sweep interval
//! - **Pool Configuration**: Worker threads and admission queue depth
//! - **TOML Files**: Load, validate and write complete engine configurations
//!
//! # Example
//!
//! ```rust
//! use folio_config::{EngineConfig, Validate};
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     model_version = "2024-06"
//!
//!     [cache]
//!     ttl_secs = 600
//!
//!     [analytics.risk]
//!     confidence_level = 0.99
//! "#).unwrap();
//!
//! assert_eq!(config.cache.ttl_secs, 600);
//! assert!(config.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod analytics;
mod engine;
mod error;

// Re-export core types
pub use engine::{CacheConfig, EngineConfig, PoolConfig, DEFAULT_MODEL_VERSION};
pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
pub use folio_portfolio::{AnalyticsConfig, PreprocessConfig, RiskConfig, SolverConfig};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::{CacheConfig, EngineConfig, PoolConfig};
    pub use crate::error::{ConfigError, ConfigResult, Validate};
    pub use folio_portfolio::AnalyticsConfig;
}
