//! Optimization requests.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::method::OptimizationMethod;
use super::series::LookbackWindow;
use crate::constraints::Constraints;
use crate::error::{OptimizerError, OptimizerResult};

/// A request to allocate capital across `symbols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Symbols to allocate across. Duplicates are rejected.
    pub symbols: Vec<String>,
    /// Objective and its parameters.
    #[serde(flatten)]
    pub method: OptimizationMethod,
    /// Allocation constraints.
    #[serde(default)]
    pub constraints: Constraints,
    /// Annual risk-free rate.
    #[serde(default)]
    pub risk_free_rate: f64,
    /// Benchmark symbol for beta, alpha and tracking error.
    #[serde(default)]
    pub benchmark: Option<String>,
    /// History used for estimation; everything available when absent.
    #[serde(default)]
    pub lookback: Option<LookbackWindow>,
}

impl OptimizationRequest {
    /// Creates a request with default constraints and a zero risk-free rate.
    pub fn new<S: Into<String>>(
        symbols: impl IntoIterator<Item = S>,
        method: OptimizationMethod,
    ) -> Self {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            method,
            constraints: Constraints::default(),
            risk_free_rate: 0.0,
            benchmark: None,
            lookback: None,
        }
    }

    /// Sets the constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets the risk-free rate.
    #[must_use]
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Sets the benchmark symbol.
    #[must_use]
    pub fn with_benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    /// Sets the lookback window.
    #[must_use]
    pub fn with_lookback(mut self, window: LookbackWindow) -> Self {
        self.lookback = Some(window);
        self
    }

    /// Rejects empty, blank or duplicate symbols and a non-finite rate.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.symbols.is_empty() {
            return Err(OptimizerError::invalid_request("no symbols requested"));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(OptimizerError::invalid_request("blank symbol"));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(OptimizerError::invalid_request(format!(
                    "duplicate symbol {}",
                    symbol
                )));
            }
        }
        if !self.risk_free_rate.is_finite() {
            return Err(OptimizerError::invalid_request("risk-free rate must be finite"));
        }
        Ok(())
    }

    /// Symbols in sorted order; the order models are estimated and solved in.
    pub fn canonical_symbols(&self) -> Vec<String> {
        let mut symbols = self.symbols.clone();
        symbols.sort();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_validate() {
        let ok = OptimizationRequest::new(["MSFT", "AAPL"], OptimizationMethod::MinVolatility);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.canonical_symbols(), vec!["AAPL", "MSFT"]);

        let empty = OptimizationRequest::new(Vec::<String>::new(), OptimizationMethod::MaxSharpe);
        assert_eq!(empty.validate().unwrap_err().code(), ErrorCode::InvalidRequest);

        let dup = OptimizationRequest::new(["AAPL", "AAPL"], OptimizationMethod::MaxSharpe);
        assert!(dup.validate().is_err());

        let bad_rate = ok.clone().with_risk_free_rate(f64::NAN);
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn test_json_contract() {
        let json = r#"{
            "symbols": ["AAPL", "MSFT"],
            "method": "mean_variance",
            "risk_aversion": 2.0,
            "risk_free_rate": 0.02
        }"#;
        let request: OptimizationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.method,
            OptimizationMethod::MeanVariance { risk_aversion: 2.0 }
        );
        assert_eq!(request.constraints, Constraints::default());
        assert!(request.benchmark.is_none());
    }
}
