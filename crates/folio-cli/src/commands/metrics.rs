//! Metrics command implementation.
//!
//! Reports the risk profile of an allocation the user already holds.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use clap::Args;
use nalgebra::DVector;
use serde::Serialize;

use folio_ext_file::CsvPriceSource;
use folio_portfolio::{build_return_model, compute_metrics, risk, RiskMetrics};
use folio_traits::market_data::{BenchmarkProvider, MarketDataProvider};

use crate::cli::OutputFormat;
use crate::commands::{parse_weights, GlobalOptions, MarketDataArgs};
use crate::output::{metric_rows, print_header, print_json_document, print_output, print_warning, WeightRow};

/// Tolerance on the weight sum before a warning is shown.
const BUDGET_TOLERANCE: f64 = 1e-6;

/// Arguments for the metrics command.
#[derive(Args, Debug)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub data: MarketDataArgs,

    /// Holdings, e.g. AAPL=0.6,MSFT=0.4
    #[arg(short, long, value_delimiter = ',', required = true, value_name = "SYMBOL=WEIGHT")]
    pub weights: Vec<String>,

    /// Benchmark symbol for beta, alpha and tracking error
    #[arg(short, long)]
    pub benchmark: Option<String>,

    /// Annual risk-free rate
    #[arg(long, default_value = "0")]
    pub risk_free_rate: f64,
}

/// Metrics of an allocation.
#[derive(Debug, Serialize)]
struct MetricsReport {
    weights: BTreeMap<String, f64>,
    risk_contributions: BTreeMap<String, f64>,
    metrics: RiskMetrics,
}

/// Execute the metrics command.
pub async fn execute(args: MetricsArgs, global: &GlobalOptions) -> Result<()> {
    let holdings = parse_weights(&args.weights, "weight", "SYMBOL=WEIGHT")?;
    let total: f64 = holdings.values().sum();
    if (total - 1.0).abs() > BUDGET_TOLERANCE && !global.quiet {
        print_warning(&format!("weights sum to {:.4}, not 1", total));
    }

    let config = global.engine_config()?;
    let window = args.data.lookback()?;
    let mut source = CsvPriceSource::new(&args.data.prices)?;
    if let Some(path) = &args.data.metadata {
        source = source.with_metadata(path)?;
    }

    let symbols: Vec<String> = holdings.keys().cloned().collect();
    let series = source.fetch_series(&symbols, window.as_ref()).await?;
    let benchmark = match &args.benchmark {
        Some(symbol) => Some(source.fetch_benchmark(symbol, window.as_ref()).await?),
        None => None,
    };

    let model = build_return_model(&series, window.as_ref(), &config.analytics.preprocess)?
        .select(&symbols)?;
    let weights = DVector::from_iterator(symbols.len(), holdings.values().copied());
    let report = MetricsReport {
        risk_contributions: contributions(&symbols, &weights, &model.covariance),
        metrics: compute_metrics(
            &model,
            &weights,
            args.risk_free_rate,
            benchmark.as_ref(),
            &config.analytics.risk,
        )?,
        weights: holdings,
    };

    print_report(&report, global)
}

fn contributions(
    symbols: &[String],
    weights: &DVector<f64>,
    covariance: &nalgebra::DMatrix<f64>,
) -> BTreeMap<String, f64> {
    match risk::risk_contributions(weights, covariance) {
        Some(rc) => symbols.iter().cloned().zip(rc.iter().copied()).collect(),
        None => symbols.iter().map(|s| (s.clone(), 0.0)).collect(),
    }
}

fn print_report(report: &MetricsReport, global: &GlobalOptions) -> Result<()> {
    if report.weights.is_empty() {
        bail!("no holdings given");
    }
    let rows: Vec<WeightRow> = report
        .weights
        .iter()
        .map(|(symbol, &weight)| WeightRow {
            symbol: symbol.clone(),
            weight,
            risk_contribution: report.risk_contributions.get(symbol).copied().unwrap_or(0.0),
        })
        .collect();

    match global.format {
        OutputFormat::Json => print_json_document(report),
        OutputFormat::Csv | OutputFormat::Minimal => print_output(&metric_rows(&report.metrics), global.format),
        OutputFormat::Table => {
            if !global.quiet {
                print_header("Holdings");
                print_output(&rows, OutputFormat::Table)?;
                print_header("Risk Metrics");
            }
            print_output(&metric_rows(&report.metrics), OutputFormat::Table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use nalgebra::DMatrix;

    #[test]
    fn test_weights_parse() {
        let cli = Cli::try_parse_from([
            "folio", "metrics", "-p", "prices.csv", "-w", "AAPL=0.6,MSFT=0.4", "-b", "SPY",
        ])
        .unwrap();
        let Commands::Metrics(args) = cli.command else {
            panic!("expected metrics");
        };
        let holdings = parse_weights(&args.weights, "weight", "SYMBOL=WEIGHT").unwrap();
        assert_eq!(holdings.get("AAPL"), Some(&0.6));
        assert_eq!(args.benchmark.as_deref(), Some("SPY"));
    }

    #[test]
    fn test_contributions_sum_to_one() {
        let symbols = vec!["A".to_string(), "B".to_string()];
        let weights = DVector::from_vec(vec![0.5, 0.5]);
        let covariance = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.01]);
        let rc = contributions(&symbols, &weights, &covariance);
        assert!((rc.values().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(rc["A"] > rc["B"]);
    }

    #[test]
    fn test_zero_variance_contributions() {
        let symbols = vec!["A".to_string()];
        let weights = DVector::from_vec(vec![0.0]);
        let covariance = DMatrix::from_row_slice(1, 1, &[0.04]);
        assert_eq!(contributions(&symbols, &weights, &covariance)["A"], 0.0);
    }
}
