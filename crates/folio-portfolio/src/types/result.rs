//! Optimization results and frontier points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::method::MethodKind;

/// Whether a result solves its problem exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confidence {
    /// Optimal to solver tolerance.
    #[default]
    Optimal,
    /// Feasible, but the objective could only be met approximately.
    Approximate {
        /// Why the result is approximate.
        reason: String,
    },
}

impl Confidence {
    /// True for [`Confidence::Optimal`].
    pub fn is_optimal(&self) -> bool {
        matches!(self, Self::Optimal)
    }
}

/// Solver status of a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Terminal solver status, e.g. `solved`.
    pub status: String,
    /// Iterations used.
    pub iterations: u32,
    /// Covariance shrinkage intensity of the model solved against.
    pub shrinkage: f64,
}

/// Standardized risk metrics of a portfolio.
///
/// Ratios are `None` when undefined (zero denominator, no history or no
/// benchmark) and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized expected return `μᵀw`.
    pub expected_return: f64,
    /// Annualized volatility `√(wᵀΣw)`.
    pub volatility: f64,
    /// `(return − r_f) / volatility`.
    pub sharpe_ratio: Option<f64>,
    /// `(return − r_f) / downside deviation`.
    pub sortino_ratio: Option<f64>,
    /// Annualized downside deviation of the return path.
    pub downside_deviation: Option<f64>,
    /// Parametric (normal) value at risk, annual horizon.
    pub value_at_risk: f64,
    /// Parametric (normal) expected shortfall, annual horizon.
    pub conditional_value_at_risk: f64,
    /// Empirical one-period value at risk of the return path.
    pub historical_var: Option<f64>,
    /// Empirical one-period expected shortfall of the return path.
    pub historical_cvar: Option<f64>,
    /// Largest peak-to-trough loss of cumulative wealth.
    pub max_drawdown: Option<f64>,
    /// Beta against the benchmark.
    pub beta: Option<f64>,
    /// Jensen's alpha against the benchmark, annualized.
    pub alpha: Option<f64>,
    /// Annualized tracking error against the benchmark.
    pub tracking_error: Option<f64>,
    /// Information ratio against the benchmark.
    pub information_ratio: Option<f64>,
    /// Confidence level of the VaR figures.
    pub confidence_level: f64,
}

/// Allocation produced by one of the optimizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Weight per requested symbol.
    pub weights: BTreeMap<String, f64>,
    /// Annualized expected return.
    pub expected_return: f64,
    /// Annualized volatility.
    pub volatility: f64,
    /// Risk metrics.
    pub metrics: RiskMetrics,
    /// Share of total variance contributed by each symbol.
    pub risk_contributions: BTreeMap<String, f64>,
    /// Black-Litterman posterior returns, when that method was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posterior_returns: Option<BTreeMap<String, f64>>,
    /// Method that produced the allocation.
    pub method: MethodKind,
    /// Wall-clock time of preprocessing, solve and analytics.
    pub solve_duration_ms: f64,
    /// Optimal or approximate.
    pub confidence: Confidence,
    /// Solver diagnostics.
    pub solver: SolverDiagnostics,
    /// Version of the estimation model.
    pub model_version: String,
}

impl OptimizationResult {
    /// Weight of `symbol`, 0 when absent.
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// One point on the efficient frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Annualized volatility.
    pub risk: f64,
    /// Annualized expected return.
    pub expected_return: f64,
    /// Weight per symbol.
    pub weights: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_json() {
        let json = serde_json::to_string(&Confidence::Approximate {
            reason: "clipped".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"approximate","reason":"clipped"}"#);
        assert!(Confidence::default().is_optimal());
    }

    #[test]
    fn test_undefined_ratios_serialize_as_null() {
        let metrics = RiskMetrics::default();
        let value = serde_json::to_value(&metrics).unwrap();
        assert!(value["sharpe_ratio"].is_null());
        assert!(value["beta"].is_null());
    }
}
