//! Risk parity (risk budgeting).
//!
//! The minimizer of `½ xᵀΣx − Σ bᵢ log xᵢ` over `x > 0` satisfies
//! `xᵢ (Σx)ᵢ = bᵢ`, so after normalization each asset contributes the share
//! `bᵢ` of total variance. Bounds and sector caps are applied afterwards by
//! water-filling; the result is flagged approximate when that moves any
//! contribution away from its budget.

use std::collections::BTreeMap;

use folio_math::optimization::{damped_newton, ConvexObjective};
use nalgebra::{DMatrix, DVector};

use super::common::polish_weights;
use super::SolveOutcome;
use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{Confidence, MethodKind, ReturnModel, SolverConfig, SolverDiagnostics};

const METHOD: MethodKind = MethodKind::RiskParity;

/// Slack on bound and cap comparisons during water-filling.
const FILL_SLACK: f64 = 1e-12;

/// Log-barrier objective of the risk budgeting problem.
struct RiskBudgetObjective<'a> {
    covariance: &'a DMatrix<f64>,
    budgets: &'a DVector<f64>,
}

impl ConvexObjective for RiskBudgetObjective<'_> {
    fn value(&self, x: &DVector<f64>) -> f64 {
        let variance = x.dot(&(self.covariance * x));
        let barrier: f64 = x.iter().zip(self.budgets.iter()).map(|(xi, bi)| bi * xi.ln()).sum();
        0.5 * variance - barrier
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        self.covariance * x - self.budgets.component_div(x)
    }

    fn hessian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let curvature = DVector::from_fn(x.len(), |i, _| self.budgets[i] / (x[i] * x[i]));
        self.covariance + DMatrix::from_diagonal(&curvature)
    }

    fn in_domain(&self, x: &DVector<f64>) -> bool {
        x.iter().all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Risk contributions proportional to `budgets` (equal when absent).
pub fn risk_parity(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    budgets: Option<&BTreeMap<String, f64>>,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    let n = model.len();
    let active: Vec<usize> = constraints
        .eligible()
        .filter(|&i| constraints.upper[i] > 0.0)
        .collect();
    if active.is_empty() {
        return Err(OptimizerError::invalid_request(
            "risk parity needs at least one asset with positive maximum weight",
        ));
    }

    let targets = risk_budgets(model, &active, budgets)?;
    let sub_cov = model.covariance.select_rows(&active).select_columns(&active);

    let objective = RiskBudgetObjective {
        covariance: &sub_cov,
        budgets: &targets,
    };
    let x0 = DVector::from_fn(active.len(), |i, _| 1.0 / sub_cov[(i, i)].max(f64::EPSILON).sqrt());
    let result = damped_newton(&objective, x0, &config.newton_config())
        .map_err(|e| OptimizerError::from_math(METHOD.as_str(), e))?;

    tracing::debug!(
        iterations = result.iterations,
        decrement = result.decrement,
        "risk parity newton converged"
    );

    let mut raw = DVector::zeros(n);
    let scale = constraints.budget / result.x.sum();
    for (k, &i) in active.iter().enumerate() {
        raw[i] = result.x[k] * scale;
    }

    let filled = water_fill(raw, constraints);
    let weights = polish_weights(&filled, constraints, METHOD, config.weight_tolerance)?;

    let deviation = max_budget_deviation(&model.covariance, &weights, &active, &targets);
    let confidence = if deviation > config.risk_contribution_tolerance {
        tracing::warn!(
            deviation,
            tolerance = config.risk_contribution_tolerance,
            "risk parity constrained away from its budgets"
        );
        Confidence::Approximate {
            reason: format!(
                "bounds or sector caps move risk contributions up to {:.4} from their budgets",
                deviation
            ),
        }
    } else {
        Confidence::Optimal
    };

    Ok(SolveOutcome {
        weights,
        confidence,
        diagnostics: SolverDiagnostics {
            status: "converged".to_string(),
            iterations: result.iterations,
            shrinkage: model.shrinkage,
        },
        posterior_returns: None,
    })
}

/// Normalized positive budgets of the active assets.
fn risk_budgets(
    model: &ReturnModel,
    active: &[usize],
    budgets: Option<&BTreeMap<String, f64>>,
) -> OptimizerResult<DVector<f64>> {
    let Some(by_symbol) = budgets else {
        return Ok(DVector::from_element(active.len(), 1.0 / active.len() as f64));
    };

    if let Some(unknown) = by_symbol.keys().find(|s| model.index_of(s).is_none()) {
        return Err(OptimizerError::invalid_request(format!(
            "risk budget given for unknown symbol {}",
            unknown
        )));
    }

    let mut b = DVector::zeros(active.len());
    for (k, &i) in active.iter().enumerate() {
        let symbol = &model.assets[i].symbol;
        match by_symbol.get(symbol) {
            Some(&v) if v.is_finite() && v > 0.0 => b[k] = v,
            Some(&v) => {
                return Err(OptimizerError::invalid_request(format!(
                    "risk budget of {} must be positive, got {}",
                    symbol, v
                )))
            }
            None => {
                return Err(OptimizerError::invalid_request(format!(
                    "no risk budget given for {}",
                    symbol
                )))
            }
        }
    }
    Ok(&b / b.sum())
}

/// Enforces bounds and sector caps while keeping free weights proportional.
///
/// Each round pins assets that cross a bound and scales breached sectors down
/// to their cap, then rescales the remaining free weights to the budget.
fn water_fill(mut w: DVector<f64>, constraints: &CompiledConstraints) -> DVector<f64> {
    let n = constraints.len();
    let mut pinned = vec![false; n];
    for i in 0..n {
        if constraints.excluded[i] || constraints.upper[i] <= 0.0 {
            w[i] = 0.0_f64.clamp(constraints.lower[i], constraints.upper[i]);
            pinned[i] = true;
        }
    }

    for _ in 0..=(n + constraints.sector_rows.len()) {
        let mut changed = false;

        for i in 0..n {
            if pinned[i] {
                continue;
            }
            if w[i] > constraints.upper[i] + FILL_SLACK {
                w[i] = constraints.upper[i];
                pinned[i] = true;
                changed = true;
            } else if w[i] < constraints.lower[i] - FILL_SLACK {
                w[i] = constraints.lower[i];
                pinned[i] = true;
                changed = true;
            }
        }

        for row in &constraints.sector_rows {
            let total: f64 = row.members.iter().map(|&i| w[i]).sum();
            if total <= row.cap + FILL_SLACK {
                continue;
            }
            let fixed: f64 = row.members.iter().filter(|&&i| pinned[i]).map(|&i| w[i]).sum();
            let free: Vec<usize> = row.members.iter().copied().filter(|&i| !pinned[i]).collect();
            if free.iter().map(|&i| w[i]).sum::<f64>() > 0.0 {
                shrink_to(&mut w, free, row.cap - fixed, &constraints.lower);
                for &i in &row.members {
                    pinned[i] = true;
                }
                changed = true;
            }
        }

        let fixed: f64 = (0..n).filter(|&i| pinned[i]).map(|i| w[i]).sum();
        let free: f64 = (0..n).filter(|&i| !pinned[i]).map(|i| w[i]).sum();
        if free > 0.0 {
            let factor = (constraints.budget - fixed) / free;
            if (factor - 1.0).abs() > FILL_SLACK {
                for i in (0..n).filter(|&i| !pinned[i]) {
                    w[i] *= factor;
                }
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
    w
}

/// Scales `members` down proportionally so they sum to `room`, holding any
/// member that would cross its lower bound at that bound.
fn shrink_to(w: &mut DVector<f64>, mut members: Vec<usize>, mut room: f64, lower: &[f64]) {
    while !members.is_empty() {
        let total: f64 = members.iter().map(|&i| w[i]).sum();
        if total <= 0.0 {
            return;
        }
        let factor = (room / total).max(0.0);
        let (floored, rest): (Vec<usize>, Vec<usize>) = members
            .iter()
            .partition(|&&i| w[i] * factor < lower[i] - FILL_SLACK);
        if floored.is_empty() {
            for i in rest {
                w[i] *= factor;
            }
            return;
        }
        for i in floored {
            w[i] = lower[i];
            room -= lower[i];
        }
        members = rest;
    }
}

fn max_budget_deviation(
    covariance: &DMatrix<f64>,
    weights: &DVector<f64>,
    active: &[usize],
    targets: &DVector<f64>,
) -> f64 {
    let marginal = covariance * weights;
    let variance = weights.dot(&marginal);
    if !(variance > 0.0) {
        return f64::INFINITY;
    }
    active
        .iter()
        .enumerate()
        .map(|(k, &i)| (weights[i] * marginal[i] / variance - targets[k]).abs())
        .fold(0.0, f64::max)
}
