//! Frontier command implementation.
//!
//! Sweeps the efficient frontier between the minimum-volatility and the
//! maximum-return portfolio.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use folio_portfolio::{FrontierPoint, OptimizationMethod, OptimizationRequest};

use crate::cli::OutputFormat;
use crate::commands::{ConstraintArgs, GlobalOptions, MarketDataArgs};
use crate::output::{format_percent, print_header, print_json_document, print_output};

/// Arguments for the frontier command.
#[derive(Args, Debug)]
pub struct FrontierArgs {
    #[command(flatten)]
    pub data: MarketDataArgs,

    /// Comma-separated symbols to allocate across
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Number of frontier points (defaults to the configured resolution)
    #[arg(short = 'n', long)]
    pub points: Option<usize>,

    /// Annual risk-free rate
    #[arg(long, default_value = "0")]
    pub risk_free_rate: f64,

    /// Show the weights of every point
    #[arg(long)]
    pub weights: bool,

    #[command(flatten)]
    pub constraints: ConstraintArgs,
}

impl FrontierArgs {
    /// Builds the request the frontier is swept for.
    pub fn to_request(&self) -> Result<OptimizationRequest> {
        let mut request =
            OptimizationRequest::new(self.symbols.iter().cloned(), OptimizationMethod::MinVolatility)
                .with_constraints(self.constraints.to_constraints()?)
                .with_risk_free_rate(self.risk_free_rate);
        request.lookback = self.data.lookback()?;
        Ok(request)
    }
}

/// One row of the frontier table.
#[derive(Debug, Clone, Serialize, Tabled)]
struct FrontierRow {
    #[tabled(rename = "#")]
    point: usize,
    #[tabled(rename = "Volatility", display_with = "display_percent")]
    risk: f64,
    #[tabled(rename = "Expected Return", display_with = "display_percent")]
    expected_return: f64,
    #[tabled(rename = "Sharpe")]
    sharpe: String,
    #[tabled(rename = "Weights")]
    weights: String,
}

fn display_percent(value: &f64) -> String {
    format_percent(*value)
}

/// Execute the frontier command.
pub async fn execute(args: FrontierArgs, global: &GlobalOptions) -> Result<()> {
    let request = args.to_request()?;
    let engine = args.data.engine(global)?;
    let points = engine.frontier(&request, args.points).await?;
    engine.shutdown().await;

    if global.format == OutputFormat::Json {
        return print_json_document(points.as_ref());
    }

    let rows = frontier_rows(&points, args.risk_free_rate, args.weights);
    if global.format == OutputFormat::Table && !global.quiet {
        print_header(&format!("Efficient Frontier ({} points)", rows.len()));
    }
    print_output(&rows, global.format)
}

fn frontier_rows(points: &[FrontierPoint], risk_free_rate: f64, show_weights: bool) -> Vec<FrontierRow> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| FrontierRow {
            point: i + 1,
            risk: p.risk,
            expected_return: p.expected_return,
            sharpe: folio_portfolio::risk::sharpe_ratio(p.expected_return, p.risk, risk_free_rate)
                .map_or_else(|| "n/a".to_string(), |s| format!("{:.3}", s)),
            weights: if show_weights {
                p.weights
                    .iter()
                    .map(|(symbol, w)| format!("{}={:.3}", symbol, w))
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                String::new()
            },
        })
        .collect()
}
