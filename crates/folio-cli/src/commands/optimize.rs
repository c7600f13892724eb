//! Optimize command implementation.
//!
//! Computes optimal weights for a set of assets.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

use folio_portfolio::types::DEFAULT_RISK_AVERSION;
use folio_portfolio::{
    BlackLittermanParams, OptimizationMethod, OptimizationRequest, OptimizationResult, View,
};

use crate::cli::OutputFormat;
use crate::commands::{
    parse_number, parse_pair, parse_weights, read_json, ConstraintArgs, GlobalOptions,
    MarketDataArgs,
};
use crate::error::{CliError, CliResult};
use crate::output::{metric_rows, print_header, print_json_document, print_output, KeyValue, WeightRow};

/// Arguments for the optimize command.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub data: MarketDataArgs,

    /// Comma-separated symbols to allocate across
    #[arg(short, long, value_delimiter = ',', required_unless_present = "request")]
    pub symbols: Vec<String>,

    /// Optimization method
    #[arg(short, long, value_enum, default_value = "min-volatility")]
    pub method: MethodArg,

    /// Risk aversion for mean-variance and Black-Litterman
    #[arg(long)]
    pub risk_aversion: Option<f64>,

    /// Annual risk-free rate
    #[arg(long, default_value = "0")]
    pub risk_free_rate: f64,

    /// Benchmark symbol for beta, alpha and tracking error
    #[arg(short, long)]
    pub benchmark: Option<String>,

    /// Risk budget for risk parity, e.g. AAPL=2 (repeatable)
    #[arg(long = "budget", value_name = "SYMBOL=BUDGET")]
    pub budgets: Vec<String>,

    /// Absolute Black-Litterman view, e.g. AAPL=0.12 (repeatable)
    #[arg(long = "view", value_name = "SYMBOL=RETURN")]
    pub views: Vec<String>,

    /// Relative Black-Litterman view, e.g. AAPL/MSFT=0.02 (repeatable)
    #[arg(long = "relative-view", value_name = "LONG/SHORT=SPREAD")]
    pub relative_views: Vec<String>,

    /// Black-Litterman prior uncertainty scale
    #[arg(long)]
    pub tau: Option<f64>,

    #[command(flatten)]
    pub constraints: ConstraintArgs,

    /// Read the full request from a JSON file instead of the flags above
    #[arg(long, conflicts_with = "symbols")]
    pub request: Option<PathBuf>,
}

/// Optimization method choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Minimum variance
    MinVolatility,
    /// Mean-variance utility
    MeanVariance,
    /// Tangency portfolio
    MaxSharpe,
    /// Mean-variance on Black-Litterman posterior returns
    BlackLitterman,
    /// Equal or budgeted risk contributions
    RiskParity,
}

impl OptimizeArgs {
    /// Builds the request from the flags or the request file.
    pub fn to_request(&self) -> Result<OptimizationRequest> {
        if let Some(path) = &self.request {
            let mut request: OptimizationRequest = read_json(path)?;
            if request.lookback.is_none() {
                request.lookback = self.data.lookback()?;
            }
            return Ok(request);
        }

        if self.symbols.is_empty() {
            return Err(CliError::MissingArgument("--symbols".into()).into());
        }

        let mut request = OptimizationRequest::new(self.symbols.iter().cloned(), self.method()?)
            .with_constraints(self.constraints.to_constraints()?)
            .with_risk_free_rate(self.risk_free_rate);
        request.benchmark = self.benchmark.clone();
        request.lookback = self.data.lookback()?;
        Ok(request)
    }

    fn method(&self) -> CliResult<OptimizationMethod> {
        Ok(match self.method {
            MethodArg::MinVolatility => OptimizationMethod::MinVolatility,
            MethodArg::MeanVariance => OptimizationMethod::MeanVariance {
                risk_aversion: self.risk_aversion.unwrap_or(DEFAULT_RISK_AVERSION),
            },
            MethodArg::MaxSharpe => OptimizationMethod::MaxSharpe,
            MethodArg::BlackLitterman => {
                let mut params = BlackLittermanParams {
                    risk_aversion: self.risk_aversion,
                    ..Default::default()
                };
                if let Some(tau) = self.tau {
                    params.tau = tau;
                }
                for view in &self.views {
                    let (symbol, value) = parse_pair(view, "view", "SYMBOL=RETURN")?;
                    let value = parse_number(value, view, "view", "SYMBOL=RETURN")?;
                    params = params.with_view(View::absolute(symbol, value));
                }
                for view in &self.relative_views {
                    let (pair, value) = parse_pair(view, "relative view", "LONG/SHORT=SPREAD")?;
                    let (long, short) = pair.split_once('/').ok_or_else(|| CliError::InvalidPair {
                        what: "relative view",
                        input: view.clone(),
                        expected: "LONG/SHORT=SPREAD",
                    })?;
                    let value = parse_number(value, view, "relative view", "LONG/SHORT=SPREAD")?;
                    params = params.with_view(View::relative(long.trim(), short.trim(), value));
                }
                OptimizationMethod::BlackLitterman(params)
            }
            MethodArg::RiskParity => OptimizationMethod::RiskParity {
                budgets: if self.budgets.is_empty() {
                    None
                } else {
                    Some(parse_weights(&self.budgets, "budget", "SYMBOL=BUDGET")?)
                },
            },
        })
    }
}

/// Execute the optimize command.
pub async fn execute(args: OptimizeArgs, global: &GlobalOptions) -> Result<()> {
    let request = args.to_request()?;
    let engine = args.data.engine(global)?;
    let result = engine.optimize(&request).await?;
    engine.shutdown().await;
    print_result(&result, global)
}

fn print_result(result: &OptimizationResult, global: &GlobalOptions) -> Result<()> {
    let rows: Vec<WeightRow> = result
        .weights
        .iter()
        .map(|(symbol, &weight)| WeightRow {
            symbol: symbol.clone(),
            weight,
            risk_contribution: result.risk_contributions.get(symbol).copied().unwrap_or(0.0),
        })
        .collect();

    match global.format {
        OutputFormat::Json => print_json_document(result),
        OutputFormat::Csv | OutputFormat::Minimal => print_output(&rows, global.format),
        OutputFormat::Table => {
            if !global.quiet {
                print_header(&format!("Optimal Weights ({})", result.method));
            }
            print_output(&rows, OutputFormat::Table)?;
            if !global.quiet {
                print_header("Risk Metrics");
                let mut metrics = metric_rows(&result.metrics);
                metrics.push(KeyValue::new(
                    "Solve Time",
                    format!("{:.1} ms", result.solve_duration_ms),
                ));
                if !result.confidence.is_optimal() {
                    metrics.push(KeyValue::new("Confidence", "approximate"));
                }
                print_output(&metrics, OutputFormat::Table)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> OptimizeArgs {
        let mut argv = vec!["folio", "optimize", "--prices", "prices.csv"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Optimize(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_min_volatility_request() {
        let args = parse(&["--symbols", "MSFT,AAPL", "--max-weight", "0.6"]);
        let request = args.to_request().unwrap();
        assert_eq!(request.symbols, vec!["MSFT", "AAPL"]);
        assert_eq!(request.method, OptimizationMethod::MinVolatility);
        assert_eq!(request.constraints.default_bounds.max, 0.6);
        assert!(request.lookback.is_none());
    }

    #[test]
    fn test_mean_variance_request() {
        let args = parse(&[
            "-s",
            "AAPL,MSFT",
            "-m",
            "mean-variance",
            "--risk-aversion",
            "3",
            "--risk-free-rate",
            "0.02",
            "--benchmark",
            "SPY",
            "--start",
            "2024-01-01",
        ]);
        let request = args.to_request().unwrap();
        assert_eq!(
            request.method,
            OptimizationMethod::MeanVariance { risk_aversion: 3.0 }
        );
        assert_eq!(request.risk_free_rate, 0.02);
        assert_eq!(request.benchmark.as_deref(), Some("SPY"));
        assert!(request.lookback.unwrap().start.is_some());
    }

    #[test]
    fn test_black_litterman_views() {
        let args = parse(&[
            "-s",
            "AAPL,MSFT",
            "-m",
            "black-litterman",
            "--view",
            "AAPL=0.12",
            "--relative-view",
            "AAPL/MSFT=0.02",
            "--tau",
            "0.1",
        ]);
        match args.to_request().unwrap().method {
            OptimizationMethod::BlackLitterman(params) => {
                assert_eq!(params.views.len(), 2);
                assert_eq!(params.tau, 0.1);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_risk_parity_budgets() {
        let args = parse(&["-s", "A,B", "-m", "risk-parity", "--budget", "A=2", "--budget", "B=1"]);
        match args.to_request().unwrap().method {
            OptimizationMethod::RiskParity { budgets: Some(b) } => {
                assert_eq!(b.get("A"), Some(&2.0));
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_symbols_required_without_request_file() {
        let err = Cli::try_parse_from(["folio", "optimize", "--prices", "p.csv"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_bad_view_is_rejected() {
        let args = parse(&["-s", "A,B", "-m", "black-litterman", "--view", "A"]);
        assert!(args.to_request().is_err());
    }
}
