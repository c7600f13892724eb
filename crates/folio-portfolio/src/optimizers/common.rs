//! Shared QP construction and weight post-processing.

use folio_math::optimization::{QpProblem, QpSolution};
use folio_math::MathResult;
use nalgebra::{DMatrix, DVector};

use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{Confidence, MethodKind, ReturnModel, SolverConfig, SolverDiagnostics};

use super::SolveOutcome;

/// QP over weights with the shared budget, bound and sector rows.
pub(crate) fn weight_problem(
    p: DMatrix<f64>,
    q: DVector<f64>,
    constraints: &CompiledConstraints,
) -> MathResult<QpProblem> {
    let n = constraints.len();
    let mut problem = QpProblem::new(p, q)?;

    problem.add_equality((0..n).map(|i| (i, 1.0)).collect(), constraints.budget)?;
    for i in 0..n {
        if constraints.excluded[i] || constraints.lower[i] == constraints.upper[i] {
            problem.add_equality(vec![(i, 1.0)], constraints.lower[i])?;
        } else {
            problem.add_lower_bound(i, constraints.lower[i])?;
            problem.add_upper_bound(i, constraints.upper[i])?;
        }
    }
    for row in &constraints.sector_rows {
        problem.add_inequality(row.members.iter().map(|&i| (i, 1.0)).collect(), row.cap)?;
    }
    Ok(problem)
}

/// Solves `problem`, mapping solver failures to `OPTIMIZATION_FAILED`.
pub(crate) fn solve_qp(
    problem: &QpProblem,
    method: MethodKind,
    config: &SolverConfig,
) -> OptimizerResult<QpSolution> {
    let solution = problem
        .solve(&config.qp_settings())
        .map_err(|e| OptimizerError::from_math(method.as_str(), e))?;
    tracing::debug!(
        method = %method,
        status = solution.status.as_str(),
        iterations = solution.iterations,
        "qp solved"
    );
    Ok(solution)
}

/// Clamps solver output into the bounds, spreads the leftover budget over
/// assets with slack and verifies every constraint.
pub(crate) fn polish_weights(
    raw: &DVector<f64>,
    constraints: &CompiledConstraints,
    method: MethodKind,
    tolerance: f64,
) -> OptimizerResult<DVector<f64>> {
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(OptimizerError::optimization_failed(
            method.as_str(),
            "numerical_error",
            "solver returned non-finite weights",
        ));
    }

    let n = constraints.len();
    let mut w = DVector::from_fn(n, |i, _| {
        raw[i].clamp(constraints.lower[i], constraints.upper[i]) + 0.0
    });

    let residual = constraints.budget - w.sum();
    if residual != 0.0 {
        let slack: Vec<f64> = (0..n)
            .map(|i| {
                if residual > 0.0 {
                    constraints.upper[i] - w[i]
                } else {
                    w[i] - constraints.lower[i]
                }
            })
            .collect();
        let total: f64 = slack.iter().sum();
        if total > 0.0 {
            let share = (residual.abs() / total).min(1.0) * residual.signum();
            for i in 0..n {
                w[i] += share * slack[i];
            }
        }
    }

    let violation = constraints.max_violation(&w);
    if violation > tolerance {
        return Err(OptimizerError::optimization_failed(
            method.as_str(),
            "constraint_violation",
            format!(
                "weights violate constraints by {:.3e} (tolerance {:.0e})",
                violation, tolerance
            ),
        ));
    }
    Ok(w)
}

/// Solves a QP over weights and post-processes the solution.
pub(crate) fn solve_weight_qp(
    method: MethodKind,
    p: DMatrix<f64>,
    q: DVector<f64>,
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    let problem = weight_problem(p, q, constraints)
        .map_err(|e| OptimizerError::from_math(method.as_str(), e))?;
    let solution = solve_qp(&problem, method, config)?;
    let weights = polish_weights(&solution.x, constraints, method, config.weight_tolerance)?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{compile, Constraints};
    use crate::types::AssetMetadata;
    use approx::assert_relative_eq;

    fn compiled(constraints: &Constraints, n: usize) -> CompiledConstraints {
        let assets: Vec<AssetMetadata> = (0..n)
            .map(|i| AssetMetadata::new(format!("A{}", i)))
            .collect();
        compile(constraints, &assets).unwrap()
    }

    #[test]
    fn test_polish_clamps_and_redistributes() {
        let c = compiled(&Constraints::new().with_default_bounds(0.0, 0.5), 3);
        let raw = DVector::from_vec(vec![-1e-9, 0.5 + 1e-9, 0.5 - 1e-7]);
        let w = polish_weights(&raw, &c, MethodKind::MinVolatility, 1e-6).unwrap();
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
        assert!(w.iter().all(|&v| (0.0..=0.5).contains(&v)));
        assert!(w[0].is_sign_positive());
    }

    #[test]
    fn test_polish_rejects_non_finite() {
        let c = compiled(&Constraints::new(), 2);
        let raw = DVector::from_vec(vec![f64::NAN, 0.5]);
        let err = polish_weights(&raw, &c, MethodKind::MaxSharpe, 1e-6).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::OptimizationFailed);
    }

    #[test]
    fn test_polish_rejects_sector_breach() {
        let assets = vec![
            AssetMetadata::new("A").with_sector("Tech"),
            AssetMetadata::new("B").with_sector("Tech"),
            AssetMetadata::new("C"),
        ];
        let c = compile(&Constraints::new().with_sector_cap("Tech", 0.5), &assets).unwrap();
        let raw = DVector::from_vec(vec![0.4, 0.4, 0.2]);
        let err = polish_weights(&raw, &c, MethodKind::MinVolatility, 1e-6).unwrap_err();
        match err {
            OptimizerError::OptimizationFailed { status, .. } => {
                assert_eq!(status, "constraint_violation");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_weight_problem_rows() {
        let c = compiled(&Constraints::new(), 2);
        let problem = weight_problem(DMatrix::identity(2, 2), DVector::zeros(2), &c).unwrap();
        // Budget plus two bounds per asset.
        assert_eq!(problem.num_constraints(), 5);
    }
}
