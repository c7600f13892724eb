//! Engine configuration: analytics plus cache and worker pool settings.

use std::path::Path;
use std::time::Duration;

use folio_portfolio::AnalyticsConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, Validate, ValidationError};

/// Model version used when none is configured.
pub const DEFAULT_MODEL_VERSION: &str = "1";

fn default_model_version() -> String {
    DEFAULT_MODEL_VERSION.to_string()
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_queue_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

// =============================================================================
// CACHE
// =============================================================================

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache successful results.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live of a cached result, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval of the background sweep of expired entries, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Result time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.enabled && self.ttl_secs == 0 {
            errors.push(ValidationError::with_rule(
                "ttl_secs",
                "TTL must be positive when caching is enabled",
                "positive",
            ));
        }

        if self.sweep_interval_secs == 0 {
            errors.push(ValidationError::with_rule(
                "sweep_interval_secs",
                "Sweep interval must be positive",
                "positive",
            ));
        }

        errors
    }
}

// =============================================================================
// WORKER POOL
// =============================================================================

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of solver threads; 0 uses the available parallelism.
    #[serde(default)]
    pub worker_threads: usize,

    /// Jobs waiting for a worker beyond which new jobs are rejected.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

impl PoolConfig {
    /// Thread count after resolving 0 to the available parallelism.
    pub fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

impl Validate for PoolConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.worker_threads > 1024 {
            errors.push(ValidationError::with_rule(
                "worker_threads",
                "Worker threads cannot exceed 1024",
                "max_threads",
            ));
        }

        if self.max_queue_depth == 0 {
            errors.push(ValidationError::with_rule(
                "max_queue_depth",
                "Queue depth must be at least 1",
                "positive",
            ));
        }

        errors
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version tag of the estimation model; part of every cache key.
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Numerical parameters.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_version: default_model_version(),
            analytics: AnalyticsConfig::default(),
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                key: path.display().to_string(),
            });
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Sets the model version.
    #[must_use]
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Sets the numerical parameters.
    #[must_use]
    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }

    /// Sets the result TTL.
    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.cache.ttl_secs = ttl_secs;
        self
    }

    /// Sets the worker thread count.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.pool.worker_threads = threads;
        self
    }

    /// Sets the admission queue depth.
    #[must_use]
    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.pool.max_queue_depth = depth;
        self
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.model_version.trim().is_empty() {
            errors.push(ValidationError::new("model_version", "Model version cannot be empty"));
        }

        errors.extend(self.analytics.validate().into_iter().map(|e| e.nested("analytics")));
        errors.extend(self.cache.validate().into_iter().map(|e| e.nested("cache")));
        errors.extend(self.pool.validate().into_iter().map(|e| e.nested("pool")));
        errors
    }
}
