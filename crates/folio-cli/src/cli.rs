//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::{ConfigArgs, FrontierArgs, MetricsArgs, OptimizeArgs};

/// Folio - Portfolio optimization and risk analytics CLI
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(long, env = "FOLIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Solver threads, overriding the configuration file
    #[arg(long, env = "FOLIO_WORKERS", global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute optimal weights for a set of assets
    Optimize(OptimizeArgs),

    /// Sweep the efficient frontier
    Frontier(FrontierArgs),

    /// Risk metrics of a given allocation
    Metrics(MetricsArgs),

    /// Inspect and validate engine configuration
    Config(ConfigArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
    /// Minimal output (weights only)
    Minimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "folio",
            "--format",
            "json",
            "--workers",
            "3",
            "config",
            "show",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.workers, Some(3));
        assert!(matches!(cli.command, Commands::Config(_)));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = Cli::try_parse_from(["folio", "--format", "xml", "config", "show"]);
        assert!(err.is_err());
    }
}
