//! Minimum volatility portfolio.

use nalgebra::DVector;

use super::common::solve_weight_qp;
use super::SolveOutcome;
use crate::constraints::CompiledConstraints;
use crate::error::OptimizerResult;
use crate::types::{MethodKind, ReturnModel, SolverConfig};

/// Minimizes `wᵀΣw` under the shared constraints.
pub fn min_volatility(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    let p = &model.covariance * 2.0;
    let q = DVector::zeros(model.len());
    solve_weight_qp(MethodKind::MinVolatility, p, q, model, constraints, config)
}
