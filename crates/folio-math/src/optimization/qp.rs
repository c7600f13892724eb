//! Dense convex quadratic programs.
//!
//! Problems have the form
//!
//! ```text
//! minimize    ½ xᵀPx + qᵀx
//! subject to  E x  = f
//!             G x <= h
//! ```
//!
//! with `P` symmetric positive semidefinite. Rows are stored sparsely and
//! converted to compressed-column form for the `clarabel` interior-point
//! solver.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, NonnegativeConeT, SolverStatus,
    SupportedConeT, ZeroConeT,
};
use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};
use crate::linear_algebra::{check_square, ensure_finite};

/// Settings for the QP solver.
#[derive(Debug, Clone, Copy)]
pub struct QpSettings {
    /// Maximum interior-point iterations.
    pub max_iterations: u32,
    /// Absolute/relative duality gap and feasibility tolerance.
    pub tolerance: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-9,
        }
    }
}

/// Terminal status of a successful solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpStatus {
    /// Converged to the requested tolerance.
    Solved,
    /// Converged to a reduced tolerance.
    AlmostSolved,
}

impl QpStatus {
    /// Stable identifier for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solved => "solved",
            Self::AlmostSolved => "almost_solved",
        }
    }
}

/// Result of a QP solve.
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Primal solution.
    pub x: DVector<f64>,
    /// Objective value `½ xᵀPx + qᵀx`.
    pub objective: f64,
    /// Iterations used.
    pub iterations: u32,
    /// Terminal status.
    pub status: QpStatus,
}

/// A sparse linear row `Σ aᵢ xᵢ (= | <=) rhs`.
#[derive(Debug, Clone)]
struct LinearRow {
    coefficients: Vec<(usize, f64)>,
    rhs: f64,
}

/// Builder and container for a convex QP.
#[derive(Debug, Clone)]
pub struct QpProblem {
    p: DMatrix<f64>,
    q: DVector<f64>,
    equalities: Vec<LinearRow>,
    inequalities: Vec<LinearRow>,
}

impl QpProblem {
    /// Creates a problem with objective `½ xᵀPx + qᵀx` and no constraints.
    pub fn new(p: DMatrix<f64>, q: DVector<f64>) -> MathResult<Self> {
        let n = check_square(&p)?;
        if q.len() != n {
            return Err(MathError::DimensionMismatch {
                rows1: n,
                cols1: n,
                rows2: q.len(),
                cols2: 1,
            });
        }
        ensure_finite(&p, "QP quadratic term")?;
        if q.iter().any(|v| !v.is_finite()) {
            return Err(MathError::non_finite("QP linear term"));
        }

        Ok(Self {
            p,
            q,
            equalities: Vec::new(),
            inequalities: Vec::new(),
        })
    }

    /// Number of decision variables.
    pub fn dimension(&self) -> usize {
        self.q.len()
    }

    /// Number of constraint rows (equalities plus inequalities).
    pub fn num_constraints(&self) -> usize {
        self.equalities.len() + self.inequalities.len()
    }

    /// Adds `Σ coefficients · x = rhs`.
    pub fn add_equality(&mut self, coefficients: Vec<(usize, f64)>, rhs: f64) -> MathResult<()> {
        let row = self.checked_row(coefficients, rhs)?;
        self.equalities.push(row);
        Ok(())
    }

    /// Adds `Σ coefficients · x <= rhs`. Rows with `rhs = +∞` are dropped.
    pub fn add_inequality(&mut self, coefficients: Vec<(usize, f64)>, rhs: f64) -> MathResult<()> {
        if rhs == f64::INFINITY {
            return Ok(());
        }
        let row = self.checked_row(coefficients, rhs)?;
        self.inequalities.push(row);
        Ok(())
    }

    /// Adds `x[index] <= upper`.
    pub fn add_upper_bound(&mut self, index: usize, upper: f64) -> MathResult<()> {
        self.add_inequality(vec![(index, 1.0)], upper)
    }

    /// Adds `x[index] >= lower`.
    pub fn add_lower_bound(&mut self, index: usize, lower: f64) -> MathResult<()> {
        if lower == f64::NEG_INFINITY {
            return Ok(());
        }
        self.add_inequality(vec![(index, -1.0)], -lower)
    }

    /// Evaluates the objective at `x`.
    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.p * x)) + self.q.dot(x)
    }

    /// Largest constraint violation at `x` (0 when feasible).
    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        let eval = |row: &LinearRow| -> f64 {
            row.coefficients.iter().map(|&(i, a)| a * x[i]).sum::<f64>() - row.rhs
        };
        let eq = self.equalities.iter().map(|r| eval(r).abs());
        let ineq = self.inequalities.iter().map(|r| eval(r).max(0.0));
        eq.chain(ineq).fold(0.0, f64::max)
    }

    /// Solves the problem.
    pub fn solve(&self, settings: &QpSettings) -> MathResult<QpSolution> {
        if settings.max_iterations == 0 || !(settings.tolerance > 0.0) {
            return Err(MathError::invalid_input(
                "QP settings need positive iterations and tolerance",
            ));
        }

        let n = self.dimension();
        let m_eq = self.equalities.len();
        let m_ineq = self.inequalities.len();
        if m_eq + m_ineq == 0 {
            return Err(MathError::invalid_input("QP has no constraints"));
        }

        let p = self.upper_triangle_csc();
        let q: Vec<f64> = self.q.iter().copied().collect();
        let (a, b) = self.constraint_csc();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if m_eq > 0 {
            cones.push(ZeroConeT(m_eq));
        }
        if m_ineq > 0 {
            cones.push(NonnegativeConeT(m_ineq));
        }

        let clarabel_settings = DefaultSettingsBuilder::default()
            .max_iter(settings.max_iterations)
            .tol_gap_abs(settings.tolerance)
            .tol_gap_rel(settings.tolerance)
            .tol_feas(settings.tolerance)
            .verbose(false)
            .build()
            .map_err(|e| MathError::invalid_input(format!("QP settings: {}", e)))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, clarabel_settings)
            .map_err(|e| MathError::invalid_input(format!("QP setup: {:?}", e)))?;
        solver.solve();

        let iterations = solver.solution.iterations;
        let status = match solver.solution.status {
            SolverStatus::Solved => QpStatus::Solved,
            SolverStatus::AlmostSolved => QpStatus::AlmostSolved,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(MathError::solver_failed("primal_infeasible", iterations));
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(MathError::solver_failed("dual_infeasible", iterations));
            }
            SolverStatus::MaxIterations => {
                return Err(MathError::solver_failed("max_iterations", iterations));
            }
            SolverStatus::NumericalError => {
                return Err(MathError::solver_failed("numerical_error", iterations));
            }
            SolverStatus::InsufficientProgress => {
                return Err(MathError::solver_failed("insufficient_progress", iterations));
            }
            other => {
                return Err(MathError::solver_failed(
                    format!("{:?}", other).to_lowercase(),
                    iterations,
                ));
            }
        };

        let x = DVector::from_column_slice(&solver.solution.x[..n]);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(MathError::solver_failed("numerical_error", iterations));
        }

        Ok(QpSolution {
            objective: self.objective(&x),
            x,
            iterations,
            status,
        })
    }

    fn checked_row(&self, coefficients: Vec<(usize, f64)>, rhs: f64) -> MathResult<LinearRow> {
        let n = self.dimension();
        if let Some(&(i, _)) = coefficients.iter().find(|(i, _)| *i >= n) {
            return Err(MathError::invalid_input(format!(
                "constraint references variable {} of {}",
                i, n
            )));
        }
        if !rhs.is_finite() || coefficients.iter().any(|(_, a)| !a.is_finite()) {
            return Err(MathError::non_finite("QP constraint row"));
        }
        Ok(LinearRow { coefficients, rhs })
    }

    fn upper_triangle_csc(&self) -> CscMatrix<f64> {
        let n = self.dimension();
        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();

        colptr.push(0);
        for j in 0..n {
            for i in 0..=j {
                // Average both triangles so slightly asymmetric input stays consistent.
                let v = 0.5 * (self.p[(i, j)] + self.p[(j, i)]);
                if v != 0.0 {
                    rowval.push(i);
                    nzval.push(v);
                }
            }
            colptr.push(rowval.len());
        }

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    fn constraint_csc(&self) -> (CscMatrix<f64>, Vec<f64>) {
        let n = self.dimension();
        let rows: Vec<&LinearRow> = self.equalities.iter().chain(&self.inequalities).collect();
        let m = rows.len();

        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (r, row) in rows.iter().enumerate() {
            for &(c, a) in &row.coefficients {
                match columns[c].last_mut() {
                    Some((last_row, value)) if *last_row == r => *value += a,
                    _ => columns[c].push((r, a)),
                }
            }
        }

        let mut colptr = Vec::with_capacity(n + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        colptr.push(0);
        for column in &columns {
            for &(r, a) in column {
                if a != 0.0 {
                    rowval.push(r);
                    nzval.push(a);
                }
            }
            colptr.push(rowval.len());
        }

        let b = rows.iter().map(|r| r.rhs).collect();
        (CscMatrix::new(m, n, colptr, rowval, nzval), b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn diag(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_row_slice(values))
    }

    #[test]
    fn test_two_asset_min_variance() {
        // min wᵀΣw, Σ = diag(0.04, 0.01), w ≥ 0, Σw = 1 -> w ∝ 1/σ²
        let mut qp = QpProblem::new(diag(&[0.08, 0.02]), DVector::zeros(2)).unwrap();
        qp.add_equality(vec![(0, 1.0), (1, 1.0)], 1.0).unwrap();
        qp.add_lower_bound(0, 0.0).unwrap();
        qp.add_lower_bound(1, 0.0).unwrap();

        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x[0], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.x[1], 0.8, epsilon = 1e-6);
        assert!(qp.max_violation(&sol.x) < 1e-7);
    }

    #[test]
    fn test_active_upper_bound() {
        let mut qp = QpProblem::new(diag(&[0.08, 0.02]), DVector::zeros(2)).unwrap();
        qp.add_equality(vec![(0, 1.0), (1, 1.0)], 1.0).unwrap();
        qp.add_lower_bound(0, 0.0).unwrap();
        qp.add_lower_bound(1, 0.0).unwrap();
        qp.add_upper_bound(1, 0.6).unwrap();

        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x[0], 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.x[1], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_term() {
        // min x² - 2x  ->  x = 1 (inside [0, 5])
        let mut qp = QpProblem::new(diag(&[2.0]), DVector::from_vec(vec![-2.0])).unwrap();
        qp.add_lower_bound(0, 0.0).unwrap();
        qp.add_upper_bound(0, 5.0).unwrap();

        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.objective, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut qp = QpProblem::new(diag(&[1.0, 1.0]), DVector::zeros(2)).unwrap();
        qp.add_equality(vec![(0, 1.0), (1, 1.0)], 1.0).unwrap();
        qp.add_upper_bound(0, 0.2).unwrap();
        qp.add_upper_bound(1, 0.2).unwrap();

        let err = qp.solve(&QpSettings::default()).unwrap_err();
        assert!(err.is_infeasible(), "unexpected error: {err}");
    }

    #[test]
    fn test_infinite_bounds_dropped() {
        let mut qp = QpProblem::new(diag(&[1.0]), DVector::zeros(1)).unwrap();
        qp.add_upper_bound(0, f64::INFINITY).unwrap();
        qp.add_lower_bound(0, f64::NEG_INFINITY).unwrap();
        assert_eq!(qp.num_constraints(), 0);
    }

    #[test]
    fn test_bad_row_rejected() {
        let mut qp = QpProblem::new(diag(&[1.0]), DVector::zeros(1)).unwrap();
        assert!(qp.add_equality(vec![(3, 1.0)], 1.0).is_err());
        assert!(qp.add_inequality(vec![(0, f64::NAN)], 1.0).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(QpProblem::new(diag(&[1.0, 1.0]), DVector::zeros(3)).is_err());
    }
}
