//! CLI command implementations.

pub mod config;
pub mod frontier;
pub mod metrics;
pub mod optimize;

// Re-export submodules for convenience
pub use config::ConfigArgs;
pub use frontier::FrontierArgs;
pub use metrics::MetricsArgs;
pub use optimize::OptimizeArgs;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use tracing::debug;

use folio_config::EngineConfig;
use folio_engine::{OptimizationEngine, OptimizationEngineBuilder};
use folio_portfolio::{Constraints, LookbackWindow};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Output format.
    pub format: OutputFormat,
    /// Suppress non-essential output.
    pub quiet: bool,
    /// Engine configuration file.
    pub config: Option<PathBuf>,
    /// Solver thread override.
    pub workers: Option<usize>,
}

impl GlobalOptions {
    /// Loads the engine configuration and applies command-line overrides.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config = config.with_worker_threads(workers);
        }
        Ok(config)
    }
}

// =============================================================================
// SHARED ARGUMENTS
// =============================================================================

/// Where price histories come from.
#[derive(Args, Debug, Clone)]
pub struct MarketDataArgs {
    /// Price history CSV in long format (date,symbol,price)
    #[arg(short, long)]
    pub prices: PathBuf,

    /// Asset metadata CSV (symbol,sector,esg_score,liquidity_score)
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// First date of history used (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// Last date of history used (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
}

impl MarketDataArgs {
    /// Lookback window, or `None` to use all history.
    pub fn lookback(&self) -> CliResult<Option<LookbackWindow>> {
        let start = self.start.as_deref().map(parse_date).transpose()?;
        let end = self.end.as_deref().map(parse_date).transpose()?;
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        Ok(Some(LookbackWindow { start, end }))
    }

    /// Builds an engine over the CSV files.
    pub fn engine(&self, global: &GlobalOptions) -> Result<OptimizationEngine> {
        let config = global.engine_config()?;
        let sources = folio_ext_file::create_file_market_data(&self.prices, self.metadata.as_deref())
            .with_context(|| format!("reading prices from {}", self.prices.display()))?;
        debug!(prices = %self.prices.display(), "market data loaded");
        Ok(OptimizationEngineBuilder::new()
            .with_config(config)
            .with_sources(sources)
            .build()?)
    }
}

/// Allocation constraints.
#[derive(Args, Debug, Clone, Default)]
pub struct ConstraintArgs {
    /// Minimum weight of every asset
    #[arg(long)]
    pub min_weight: Option<f64>,

    /// Maximum weight of every asset
    #[arg(long)]
    pub max_weight: Option<f64>,

    /// Per-asset bounds, e.g. AAPL=0.05:0.4 (repeatable)
    #[arg(long = "bound", value_name = "SYMBOL=MIN:MAX")]
    pub bounds: Vec<String>,

    /// Sector cap, e.g. Tech=0.4 (repeatable)
    #[arg(long = "sector-cap", value_name = "SECTOR=CAP")]
    pub sector_caps: Vec<String>,

    /// Exclude assets below this ESG score
    #[arg(long)]
    pub min_esg: Option<f64>,

    /// Exclude assets below this liquidity score
    #[arg(long)]
    pub min_liquidity: Option<f64>,

    /// Allow negative weights
    #[arg(long)]
    pub allow_short: bool,

    /// Net budget (sum of weights)
    #[arg(long)]
    pub leverage: Option<f64>,
}

impl ConstraintArgs {
    /// Builds the constraint set.
    pub fn to_constraints(&self) -> CliResult<Constraints> {
        let defaults = Constraints::new().default_bounds;
        let mut constraints = Constraints::new()
            .with_default_bounds(
                self.min_weight.unwrap_or(defaults.min),
                self.max_weight.unwrap_or(defaults.max),
            )
            .with_short_selling(self.allow_short);

        for bound in &self.bounds {
            let (symbol, range) = parse_pair(bound, "bound", "SYMBOL=MIN:MAX")?;
            let (min, max) = range.split_once(':').ok_or_else(|| invalid_bound(bound))?;
            let min = min.trim().parse().map_err(|_| invalid_bound(bound))?;
            let max = max.trim().parse().map_err(|_| invalid_bound(bound))?;
            constraints = constraints.with_bounds(symbol, min, max);
        }
        for cap in &self.sector_caps {
            let (sector, value) = parse_pair(cap, "sector cap", "SECTOR=CAP")?;
            let cap = parse_number(value, cap, "sector cap", "SECTOR=CAP")?;
            constraints = constraints.with_sector_cap(sector, cap);
        }
        if let Some(score) = self.min_esg {
            constraints = constraints.with_min_esg_score(score);
        }
        if let Some(score) = self.min_liquidity {
            constraints = constraints.with_min_liquidity(score);
        }
        if let Some(leverage) = self.leverage {
            constraints = constraints.with_leverage(leverage);
        }
        Ok(constraints)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parses a date string in YYYY-MM-DD format.
pub fn parse_date(s: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Splits `KEY=VALUE`.
pub fn parse_pair<'a>(
    input: &'a str,
    what: &'static str,
    expected: &'static str,
) -> CliResult<(&'a str, &'a str)> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim(), value.trim()))
        }
        _ => Err(CliError::InvalidPair {
            what,
            input: input.to_string(),
            expected,
        }),
    }
}

/// Parses the number of a `KEY=VALUE` argument.
pub fn parse_number(
    value: &str,
    input: &str,
    what: &'static str,
    expected: &'static str,
) -> CliResult<f64> {
    value.parse().map_err(|_| CliError::InvalidPair {
        what,
        input: input.to_string(),
        expected,
    })
}

/// Parses `KEY=VALUE` arguments into a map.
pub fn parse_weights(
    inputs: &[String],
    what: &'static str,
    expected: &'static str,
) -> CliResult<std::collections::BTreeMap<String, f64>> {
    inputs
        .iter()
        .map(|input| {
            let (key, value) = parse_pair(input, what, expected)?;
            Ok((key.to_string(), parse_number(value, input, what, expected)?))
        })
        .collect()
}

fn invalid_bound(input: &str) -> CliError {
    CliError::InvalidPair {
        what: "bound",
        input: input.to_string(),
        expected: "SYMBOL=MIN:MAX",
    }
}

/// Reads a JSON document.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            parse_date("03/01/2024").unwrap_err(),
            CliError::InvalidDate("03/01/2024".into())
        );
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("Tech = 0.4", "cap", "S=C").unwrap(), ("Tech", "0.4"));
        assert!(parse_pair("Tech", "cap", "S=C").is_err());
        assert!(parse_pair("=0.4", "cap", "S=C").is_err());
    }

    #[test]
    fn test_constraints_from_args() {
        let args = ConstraintArgs {
            max_weight: Some(0.5),
            bounds: vec!["AAPL=0.1:0.3".into()],
            sector_caps: vec!["Tech=0.6".into()],
            min_esg: Some(50.0),
            ..Default::default()
        };
        let constraints = args.to_constraints().unwrap();
        assert_eq!(constraints.default_bounds.max, 0.5);
        assert_eq!(constraints.default_bounds.min, 0.0);
        assert_eq!(constraints.bounds_for("AAPL").min, 0.1);
        assert_eq!(constraints.bounds_for("AAPL").max, 0.3);
        assert_eq!(constraints.sector_caps.get("Tech"), Some(&0.6));
        assert_eq!(constraints.min_esg_score, Some(50.0));
        assert!(constraints.leverage.is_none());
    }

    #[test]
    fn test_malformed_bound() {
        let args = ConstraintArgs {
            bounds: vec!["AAPL=0.1".into()],
            ..Default::default()
        };
        assert!(matches!(
            args.to_constraints(),
            Err(CliError::InvalidPair { what: "bound", .. })
        ));
    }

    #[test]
    fn test_lookback() {
        let args = MarketDataArgs {
            prices: PathBuf::from("prices.csv"),
            metadata: None,
            start: Some("2024-01-01".into()),
            end: None,
        };
        let window = args.lookback().unwrap().unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(window.end.is_none());

        let all = MarketDataArgs { start: None, ..args };
        assert!(all.lookback().unwrap().is_none());
    }

    #[test]
    fn test_workers_override() {
        let global = GlobalOptions {
            format: OutputFormat::Table,
            quiet: false,
            config: None,
            workers: Some(2),
        };
        assert_eq!(global.engine_config().unwrap().pool.worker_threads, 2);
    }
}
