//! Damped Newton minimization for smooth convex objectives with an open domain.
//!
//! Used for log-barrier problems where iterates must stay strictly inside
//! the domain (e.g. `x > 0`). The step is backtracked first until the trial
//! point is in the domain, then until the Armijo condition holds.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};
use crate::linear_algebra::{cholesky_solve, solve_linear_system};

/// A twice-differentiable convex objective.
pub trait ConvexObjective {
    /// Objective value. Only called on points inside the domain.
    fn value(&self, x: &DVector<f64>) -> f64;

    /// Gradient at `x`.
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Hessian at `x`.
    fn hessian(&self, x: &DVector<f64>) -> DMatrix<f64>;

    /// Whether `x` lies in the open domain of the objective.
    fn in_domain(&self, x: &DVector<f64>) -> bool {
        x.iter().all(|v| v.is_finite())
    }
}

/// Configuration for [`damped_newton`].
#[derive(Debug, Clone, Copy)]
pub struct NewtonConfig {
    /// Stop when half the squared Newton decrement falls below this value.
    pub tolerance: f64,
    /// Maximum Newton iterations.
    pub max_iterations: u32,
    /// Armijo sufficient-decrease parameter.
    pub armijo: f64,
    /// Backtracking contraction factor.
    pub backtrack: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 100,
            armijo: 1e-4,
            backtrack: 0.5,
        }
    }
}

/// Result of a converged Newton run.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Minimizer.
    pub x: DVector<f64>,
    /// Objective value at the minimizer.
    pub objective: f64,
    /// Iterations used.
    pub iterations: u32,
    /// Final half squared Newton decrement.
    pub decrement: f64,
}

const MIN_STEP: f64 = 1e-16;

/// Minimizes `objective` from a strictly feasible starting point.
///
/// Fails with [`MathError::ConvergenceFailed`] when the iteration budget is
/// exhausted or the line search cannot make progress.
pub fn damped_newton<F: ConvexObjective>(
    objective: &F,
    x0: DVector<f64>,
    config: &NewtonConfig,
) -> MathResult<NewtonResult> {
    if !objective.in_domain(&x0) {
        return Err(MathError::invalid_input(
            "Newton starting point is outside the domain",
        ));
    }

    let mut x = x0;
    let mut fx = objective.value(&x);
    let mut decrement = f64::INFINITY;

    for iteration in 0..config.max_iterations {
        let g = objective.gradient(&x);
        let h = objective.hessian(&x);
        let neg_g = -&g;

        let dx = match cholesky_solve(&h, &neg_g) {
            Ok(dx) => dx,
            Err(_) => solve_linear_system(&h, &neg_g)?,
        };

        let slope = g.dot(&dx);
        decrement = -slope / 2.0;
        if !decrement.is_finite() {
            return Err(MathError::non_finite("Newton decrement"));
        }
        if decrement <= config.tolerance {
            return Ok(NewtonResult {
                x,
                objective: fx,
                iterations: iteration,
                decrement,
            });
        }

        let mut t = 1.0;
        let mut trial = &x + &dx * t;
        while !objective.in_domain(&trial) {
            t *= config.backtrack;
            if t < MIN_STEP {
                return Err(MathError::convergence_failed(iteration, decrement));
            }
            trial = &x + &dx * t;
        }

        let mut f_trial = objective.value(&trial);
        while f_trial > fx + config.armijo * t * slope {
            t *= config.backtrack;
            if t < MIN_STEP {
                return Err(MathError::convergence_failed(iteration, decrement));
            }
            trial = &x + &dx * t;
            f_trial = objective.value(&trial);
        }

        x = trial;
        fx = f_trial;
    }

    Err(MathError::convergence_failed(config.max_iterations, decrement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// f(x) = ½ xᵀAx − Σ log xᵢ
    struct LogBarrierQuadratic {
        a: DMatrix<f64>,
    }

    impl ConvexObjective for LogBarrierQuadratic {
        fn value(&self, x: &DVector<f64>) -> f64 {
            0.5 * x.dot(&(&self.a * x)) - x.iter().map(|v| v.ln()).sum::<f64>()
        }

        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            &self.a * x - x.map(|v| 1.0 / v)
        }

        fn hessian(&self, x: &DVector<f64>) -> DMatrix<f64> {
            &self.a + DMatrix::from_diagonal(&x.map(|v| 1.0 / (v * v)))
        }

        fn in_domain(&self, x: &DVector<f64>) -> bool {
            x.iter().all(|v| *v > 0.0 && v.is_finite())
        }
    }

    #[test]
    fn test_diagonal_barrier() {
        // Stationarity: a x - 1/x = 0  ->  x = 1/sqrt(a)
        let f = LogBarrierQuadratic {
            a: DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 1.0])),
        };
        let result = damped_newton(&f, DVector::from_vec(vec![1.0, 1.0]), &NewtonConfig::default())
            .unwrap();

        assert_abs_diff_eq!(result.x[0], 0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(result.x[1], 1.0, epsilon = 1e-8);
        assert!(result.iterations > 0);
    }

    #[test]
    fn test_far_start_stays_in_domain() {
        let f = LogBarrierQuadratic {
            a: DMatrix::from_diagonal(&DVector::from_vec(vec![100.0, 0.01])),
        };
        let result = damped_newton(
            &f,
            DVector::from_vec(vec![50.0, 1e-3]),
            &NewtonConfig::default(),
        )
        .unwrap();

        assert_abs_diff_eq!(result.x[0], 0.1, epsilon = 1e-8);
        assert_abs_diff_eq!(result.x[1], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_infeasible_start() {
        let f = LogBarrierQuadratic {
            a: DMatrix::identity(2, 2),
        };
        assert!(damped_newton(&f, DVector::from_vec(vec![-1.0, 1.0]), &NewtonConfig::default())
            .is_err());
    }

    #[test]
    fn test_iteration_budget() {
        let f = LogBarrierQuadratic {
            a: DMatrix::identity(2, 2),
        };
        let config = NewtonConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let err = damped_newton(&f, DVector::from_vec(vec![100.0, 0.01]), &config).unwrap_err();
        assert!(matches!(err, MathError::ConvergenceFailed { iterations: 1, .. }));
    }
}
