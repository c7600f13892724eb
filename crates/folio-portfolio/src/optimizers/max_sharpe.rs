//! Maximum Sharpe ratio portfolio.
//!
//! The ratio `(μᵀw − r_f) / √(wᵀΣw)` is not convex in `w`, but with the
//! substitution `y = κw` (κ > 0) and the normalization `μᵀy − r_f·κ = 1` it
//! becomes the convex QP
//!
//! ```text
//! minimize    yᵀΣy
//! subject to  μᵀy − r_f·κ = 1
//!             1ᵀy = budget · κ
//!             lower · κ <= y <= upper · κ
//!             Σ_{i ∈ s} yᵢ <= cap_s · κ
//!             κ >= 0
//! ```
//!
//! and `w = y / κ`. The risk-free rate sits on κ rather than on every `yᵢ`
//! so the objective stays `(μᵀw − r_f) / σ` when the budget is not 1.

use folio_math::optimization::QpProblem;
use folio_math::MathResult;
use nalgebra::{DMatrix, DVector};

use super::common::{polish_weights, solve_qp};
use super::SolveOutcome;
use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::frontier::max_return_portfolio;
use crate::types::{Confidence, MethodKind, ReturnModel, SolverConfig, SolverDiagnostics};

const METHOD: MethodKind = MethodKind::MaxSharpe;

/// Smallest accepted scale κ.
const MIN_SCALE: f64 = 1e-12;

/// Maximizes the Sharpe ratio under the shared constraints.
pub fn max_sharpe(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    risk_free_rate: f64,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    // Highest return any feasible portfolio reaches, at the full budget.
    let best = model.mu.dot(&max_return_portfolio(&model.mu, constraints));
    if !(best > risk_free_rate) {
        return Err(OptimizerError::NoPositiveExcessReturn {
            risk_free_rate,
            best_expected_return: best,
        });
    }

    let problem = scaled_problem(model, constraints, risk_free_rate)
        .map_err(|e| OptimizerError::from_math(METHOD.as_str(), e))?;

    let solution = match solve_qp(&problem, METHOD, config) {
        Ok(solution) => solution,
        Err(OptimizerError::OptimizationFailed { status, .. }) if status == "primal_infeasible" => {
            return Err(OptimizerError::NoPositiveExcessReturn {
                risk_free_rate,
                best_expected_return: best,
            });
        }
        Err(e) => return Err(e),
    };

    let n = model.len();
    let kappa = solution.x[n];
    if !(kappa > MIN_SCALE) {
        return Err(OptimizerError::optimization_failed(
            METHOD.as_str(),
            "non_positive_scale",
            format!("scale variable κ = {:.3e} is not positive", kappa),
        ));
    }

    let raw = DVector::from_fn(n, |i, _| solution.x[i] / kappa);
    let weights = polish_weights(&raw, constraints, METHOD, config.weight_tolerance)?;

    Ok(SolveOutcome {
        weights,
        confidence: Confidence::Optimal,
        diagnostics: SolverDiagnostics {
            status: solution.status.as_str().to_string(),
            iterations: solution.iterations,
            shrinkage: model.shrinkage,
        },
        posterior_returns: None,
    })
}

fn scaled_problem(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    risk_free_rate: f64,
) -> MathResult<QpProblem> {
    let n = model.len();
    let kappa = n;

    let mut p = DMatrix::zeros(n + 1, n + 1);
    p.view_mut((0, 0), (n, n)).copy_from(&(&model.covariance * 2.0));
    let mut problem = QpProblem::new(p, DVector::zeros(n + 1))?;

    let mut excess_row: Vec<(usize, f64)> = (0..n).map(|i| (i, model.mu[i])).collect();
    excess_row.push((kappa, -risk_free_rate));
    problem.add_equality(excess_row, 1.0)?;

    let mut budget_row: Vec<(usize, f64)> = (0..n).map(|i| (i, 1.0)).collect();
    budget_row.push((kappa, -constraints.budget));
    problem.add_equality(budget_row, 0.0)?;

    for i in 0..n {
        if constraints.excluded[i] {
            problem.add_equality(vec![(i, 1.0)], 0.0)?;
            continue;
        }
        problem.add_inequality(vec![(i, -1.0), (kappa, constraints.lower[i])], 0.0)?;
        problem.add_inequality(vec![(i, 1.0), (kappa, -constraints.upper[i])], 0.0)?;
    }

    for row in &constraints.sector_rows {
        let mut coefficients: Vec<(usize, f64)> = row.members.iter().map(|&i| (i, 1.0)).collect();
        coefficients.push((kappa, -row.cap));
        problem.add_inequality(coefficients, 0.0)?;
    }

    problem.add_lower_bound(kappa, 0.0)?;
    Ok(problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{compile, Constraints};
    use crate::error::ErrorCode;
    use crate::types::AssetMetadata;
    use approx::assert_relative_eq;

    fn model(mu: Vec<f64>, variances: Vec<f64>) -> ReturnModel {
        let assets = (0..mu.len())
            .map(|i| AssetMetadata::new(format!("A{}", i)))
            .collect();
        let cov = DMatrix::from_diagonal(&DVector::from_vec(variances));
        ReturnModel::from_moments(assets, mu, cov).unwrap()
    }

    #[test]
    fn test_uncorrelated_closed_form() {
        // w ∝ Σ⁻¹(μ − r_f) = (0.08 / 0.04, 0.03 / 0.01) = (2, 3)
        let m = model(vec![0.10, 0.05], vec![0.04, 0.01]);
        let c = compile(&Constraints::new(), &m.assets).unwrap();
        let out = max_sharpe(&m, &c, 0.02, &SolverConfig::default()).unwrap();
        assert_relative_eq!(out.weights[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(out.weights[1], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_bound_binds() {
        let m = model(vec![0.10, 0.05], vec![0.04, 0.01]);
        let c = compile(&Constraints::new().with_bounds("A1", 0.0, 0.5), &m.assets).unwrap();
        let out = max_sharpe(&m, &c, 0.02, &SolverConfig::default()).unwrap();
        assert_relative_eq!(out.weights[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out.weights.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_positive_excess_return() {
        let m = model(vec![0.01, 0.02], vec![0.04, 0.01]);
        let c = compile(&Constraints::new(), &m.assets).unwrap();
        let err = max_sharpe(&m, &c, 0.03, &SolverConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoPositiveExcessReturn);
    }

    #[test]
    fn test_leveraged_budget_matches_grid_search() {
        let m = model(vec![0.10, 0.05], vec![0.04, 0.01]);
        let c = compile(
            &Constraints::new()
                .with_leverage(1.5)
                .with_default_bounds(0.0, 1.5),
            &m.assets,
        )
        .unwrap();
        let rf = 0.04;
        let out = max_sharpe(&m, &c, rf, &SolverConfig::default()).unwrap();
        assert_relative_eq!(out.weights.sum(), 1.5, epsilon = 1e-9);

        let sharpe = |w: &DVector<f64>| (m.mu.dot(w) - rf) / w.dot(&(&m.covariance * w)).sqrt();
        let grid_best = (0..=1500)
            .map(|k| {
                let a = k as f64 / 1000.0;
                sharpe(&DVector::from_vec(vec![a, 1.5 - a]))
            })
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(sharpe(&out.weights) >= grid_best - 1e-6);
        assert_relative_eq!(out.weights[0], 0.66, epsilon = 1e-3);
    }

    #[test]
    fn test_leverage_can_lift_return_above_rate() {
        // No single asset beats 6%, but 1.5x of the better one does.
        let m = model(vec![0.05, 0.03], vec![0.04, 0.01]);
        let c = compile(
            &Constraints::new()
                .with_leverage(1.5)
                .with_default_bounds(0.0, 1.5),
            &m.assets,
        )
        .unwrap();
        let out = max_sharpe(&m, &c, 0.06, &SolverConfig::default()).unwrap();
        assert!(m.mu.dot(&out.weights) > 0.06);
    }

    #[test]
    fn test_beats_equal_weight() {
        let m = model(vec![0.12, 0.08, 0.05], vec![0.09, 0.04, 0.01]);
        let c = compile(&Constraints::new(), &m.assets).unwrap();
        let out = max_sharpe(&m, &c, 0.01, &SolverConfig::default()).unwrap();
        let sharpe = |w: &DVector<f64>| {
            (m.mu.dot(w) - 0.01) / w.dot(&(&m.covariance * w)).sqrt()
        };
        let equal = DVector::from_element(3, 1.0 / 3.0);
        assert!(sharpe(&out.weights) >= sharpe(&equal) - 1e-9);
    }
}
