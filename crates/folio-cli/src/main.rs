//! Folio CLI - Command-line interface for portfolio optimization and risk analytics.
//!
//! # Usage
//!
//! ```bash
//! # Minimum-volatility weights, capped at 40% per asset
//! folio optimize --prices prices.csv --symbols AAPL,MSFT,TLT --max-weight 0.4
//!
//! # Tangency portfolio with benchmark-relative metrics
//! folio optimize -p prices.csv -s AAPL,MSFT,TLT -m max-sharpe --risk-free-rate 0.03 -b SPY
//!
//! # Efficient frontier with 15 points
//! folio frontier -p prices.csv -s AAPL,MSFT,TLT -n 15
//!
//! # Risk of an existing allocation
//! folio metrics -p prices.csv -w AAPL=0.5,TLT=0.5
//!
//! # Write a configuration file to edit
//! folio config init folio.toml
//! ```

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_portfolio::OptimizerError;

mod cli;
mod commands;
mod error;
mod output;

use cli::{Cli, Commands};
use commands::GlobalOptions;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("folio_cli=debug,folio_engine=debug,folio_portfolio=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let global = GlobalOptions {
        format: cli.format,
        quiet: cli.quiet,
        config: cli.config,
        workers: cli.workers,
    };

    let outcome = match cli.command {
        Commands::Optimize(args) => commands::optimize::execute(args, &global).await,
        Commands::Frontier(args) => commands::frontier::execute(args, &global).await,
        Commands::Metrics(args) => commands::metrics::execute(args, &global).await,
        Commands::Config(args) => commands::config::execute(args, &global),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<OptimizerError>() {
                Some(err) => output::print_error(&format!("[{}] {}", err.code(), err)),
                None => output::print_error(&format!("{:#}", e)),
            }
            ExitCode::FAILURE
        }
    }
}
