//! Efficient frontier generation.
//!
//! The sweep runs from the minimum volatility portfolio to the maximum
//! achievable return, solving `min wᵀΣw` subject to `μᵀw = target` plus the
//! shared constraints at evenly spaced targets. The top target is posed as
//! `μᵀw >= return_max − ε`, which is the same point but leaves the solver an
//! interior to work with. Failed targets are skipped and the result is
//! filtered down to non-dominated points ordered by risk.

use nalgebra::DVector;
use tracing::debug;

use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::optimizers::{min_volatility, polish_weights, solve_qp, weight_problem};
use crate::types::{FrontierPoint, MethodKind, ReturnModel, SolverConfig};

/// Return spans below this collapse the frontier to a single point.
const MIN_RETURN_SPAN: f64 = 1e-12;

/// Slack on the top target return.
const ENDPOINT_SLACK: f64 = 1e-9;

/// Highest-return allocation: fills assets in descending expected return
/// from their minimum weights, respecting bounds, sector caps and budget.
pub fn max_return_portfolio(mu: &DVector<f64>, constraints: &CompiledConstraints) -> DVector<f64> {
    let n = constraints.len();
    let mut w = DVector::from_column_slice(&constraints.lower);
    let mut remaining = constraints.budget - w.sum();

    let mut sector_of = vec![None; n];
    let mut sector_room: Vec<f64> = Vec::with_capacity(constraints.sector_rows.len());
    for (s, row) in constraints.sector_rows.iter().enumerate() {
        for &i in &row.members {
            sector_of[i] = Some(s);
        }
        sector_room.push(row.cap - row.members.iter().map(|&i| w[i]).sum::<f64>());
    }

    let mut order: Vec<usize> = constraints.eligible().collect();
    order.sort_by(|&a, &b| mu[b].total_cmp(&mu[a]).then(a.cmp(&b)));

    for i in order {
        if remaining <= 0.0 {
            break;
        }
        let mut add = (constraints.upper[i] - w[i]).min(remaining);
        if let Some(s) = sector_of[i] {
            add = add.min(sector_room[s]);
            sector_room[s] -= add.max(0.0);
        }
        if add > 0.0 {
            w[i] += add;
            remaining -= add;
        }
    }
    w
}

/// Computes up to `points` frontier points.
///
/// `cancelled` is polled before each point; a `true` aborts the sweep with
/// [`OptimizerError::Cancelled`].
pub fn efficient_frontier(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    points: usize,
    config: &SolverConfig,
    cancelled: impl Fn() -> bool,
) -> OptimizerResult<Vec<FrontierPoint>> {
    if points < 2 {
        return Err(OptimizerError::invalid_request(format!(
            "frontier needs at least 2 points, got {}",
            points
        )));
    }
    if constraints.len() != model.len() {
        return Err(OptimizerError::invalid_request(
            "constraints and model cover different assets",
        ));
    }
    if cancelled() {
        return Err(OptimizerError::Cancelled);
    }

    let min_vol = min_volatility(model, constraints, config)?.weights;
    let max_ret = max_return_portfolio(&model.mu, constraints);
    let return_min = model.mu.dot(&min_vol);
    let return_max = model.mu.dot(&max_ret);

    if return_max - return_min < MIN_RETURN_SPAN {
        return Ok(vec![point(model, &min_vol)]);
    }

    let mut frontier = Vec::with_capacity(points);
    frontier.push(point(model, &min_vol));

    for k in 1..points {
        if cancelled() {
            return Err(OptimizerError::Cancelled);
        }
        let target = return_min + (return_max - return_min) * k as f64 / (points - 1) as f64;
        let top = k == points - 1;
        match target_portfolio(model, constraints, target, top, config) {
            Ok(w) => frontier.push(point(model, &w)),
            Err(e) => debug!(target, error = %e, "skipping frontier target"),
        }
    }

    Ok(non_dominated(frontier))
}

fn target_portfolio(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    target: f64,
    top: bool,
    config: &SolverConfig,
) -> OptimizerResult<DVector<f64>> {
    let method = MethodKind::MinVolatility;
    let problem = weight_problem(
        &model.covariance * 2.0,
        DVector::zeros(model.len()),
        constraints,
    )
    .and_then(|mut p| {
        if top {
            p.add_inequality(
                model.mu.iter().map(|m| -m).enumerate().collect(),
                -(target - ENDPOINT_SLACK),
            )?;
        } else {
            p.add_equality(model.mu.iter().copied().enumerate().collect(), target)?;
        }
        Ok(p)
    })
    .map_err(|e| OptimizerError::from_math(method.as_str(), e))?;
    let solution = solve_qp(&problem, method, config)?;
    polish_weights(&solution.x, constraints, method, config.weight_tolerance)
}

fn point(model: &ReturnModel, weights: &DVector<f64>) -> FrontierPoint {
    FrontierPoint {
        risk: weights.dot(&(&model.covariance * weights)).max(0.0).sqrt(),
        expected_return: model.mu.dot(weights),
        weights: model.weights_by_symbol(weights),
    }
}

/// Sorts by risk and keeps only points that strictly improve on the return
/// of every cheaper point.
fn non_dominated(mut points: Vec<FrontierPoint>) -> Vec<FrontierPoint> {
    points.sort_by(|a, b| {
        a.risk
            .total_cmp(&b.risk)
            .then(b.expected_return.total_cmp(&a.expected_return))
    });
    let mut kept: Vec<FrontierPoint> = Vec::with_capacity(points.len());
    for p in points {
        let improves = kept
            .last()
            .map_or(true, |last| p.expected_return > last.expected_return + MIN_RETURN_SPAN);
        if improves {
            kept.push(p);
        }
    }
    kept
}
