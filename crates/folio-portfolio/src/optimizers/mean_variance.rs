//! Mean-variance utility.

use nalgebra::DVector;

use super::common::solve_weight_qp;
use super::SolveOutcome;
use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{MethodKind, ReturnModel, SolverConfig};

/// Minimizes `λ wᵀΣw − μᵀw` under the shared constraints.
pub fn mean_variance(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    risk_aversion: f64,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    mean_variance_with_returns(
        MethodKind::MeanVariance,
        model,
        &model.mu,
        constraints,
        risk_aversion,
        config,
    )
}

/// Mean-variance against `mu` instead of the model's own expected returns.
pub(crate) fn mean_variance_with_returns(
    method: MethodKind,
    model: &ReturnModel,
    mu: &DVector<f64>,
    constraints: &CompiledConstraints,
    risk_aversion: f64,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    if !(risk_aversion.is_finite() && risk_aversion > 0.0) {
        return Err(OptimizerError::optimization_failed(
            method.as_str(),
            "invalid_parameter",
            format!("risk aversion must be positive, got {}", risk_aversion),
        ));
    }

    let p = &model.covariance * (2.0 * risk_aversion);
    let q = -mu;
    solve_weight_qp(method, p, q, model, constraints, config)
}
