//! Optimization core.
//!
//! Every method shares the budget, per-asset bounds and sector caps of a
//! [`CompiledConstraints`] and differs only in objective:
//!
//! | Method | Formulation |
//! |--------|-------------|
//! | Minimum volatility | QP, `min wᵀΣw` |
//! | Mean-variance | QP, `min λ wᵀΣw − μᵀw` |
//! | Maximum Sharpe | QP in `(y, κ)` with `y = κw` |
//! | Black-Litterman | Posterior returns, then mean-variance |
//! | Risk parity | Damped Newton on `½ xᵀΣx − Σ bᵢ log xᵢ` |
//!
//! [`solve`] is the single entry point.

mod black_litterman;
mod common;
mod max_sharpe;
mod mean_variance;
mod min_volatility;
mod risk_parity;

pub use black_litterman::{black_litterman, posterior_returns};
pub(crate) use common::{polish_weights, solve_qp, weight_problem};
pub use max_sharpe::max_sharpe;
pub use mean_variance::mean_variance;
pub use min_volatility::min_volatility;
pub use risk_parity::risk_parity;

use nalgebra::DVector;

use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{Confidence, OptimizationMethod, ReturnModel, SolverConfig, SolverDiagnostics};

/// Weights and diagnostics of one solve, in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Weight per asset.
    pub weights: DVector<f64>,
    /// Optimal or approximate.
    pub confidence: Confidence,
    /// Solver status and iterations.
    pub diagnostics: SolverDiagnostics,
    /// Black-Litterman posterior returns.
    pub posterior_returns: Option<DVector<f64>>,
}

/// Solves `method` for `model` under `constraints`.
pub fn solve(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    method: &OptimizationMethod,
    risk_free_rate: f64,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    if constraints.len() != model.len() {
        return Err(OptimizerError::invalid_request(format!(
            "constraints cover {} assets, model has {}",
            constraints.len(),
            model.len()
        )));
    }

    let kind = method.kind();
    let _span = tracing::debug_span!("solve", method = %kind, assets = model.len()).entered();

    match method {
        OptimizationMethod::MinVolatility => min_volatility(model, constraints, config),
        OptimizationMethod::MeanVariance { risk_aversion } => {
            mean_variance(model, constraints, *risk_aversion, config)
        }
        OptimizationMethod::MaxSharpe => max_sharpe(model, constraints, risk_free_rate, config),
        OptimizationMethod::BlackLitterman(params) => {
            black_litterman(model, constraints, params, config)
        }
        OptimizationMethod::RiskParity { budgets } => {
            risk_parity(model, constraints, budgets.as_ref(), config)
        }
    }
}
