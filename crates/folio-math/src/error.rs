//! Error types for mathematical operations.

use thiserror::Error;

/// A specialized Result type for mathematical operations.
pub type MathResult<T> = Result<T, MathError>;

/// Errors that can occur during mathematical operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Iterative algorithm failed to converge.
    #[error("Convergence failed after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: u32,
        /// Final residual value.
        residual: f64,
    },

    /// Matrix is singular (not invertible).
    #[error("Singular matrix: cannot invert")]
    SingularMatrix,

    /// Matrix is not symmetric within tolerance.
    #[error("Matrix is not symmetric: |a[{row},{col}] - a[{col},{row}]| = {gap:.2e}")]
    NotSymmetric {
        /// Row of the worst offending entry.
        row: usize,
        /// Column of the worst offending entry.
        col: usize,
        /// Absolute asymmetry.
        gap: f64,
    },

    /// Matrix is not positive definite.
    #[error("Matrix is not positive definite (min eigenvalue {min_eigenvalue:.3e})")]
    NotPositiveDefinite {
        /// Smallest eigenvalue found.
        min_eigenvalue: f64,
    },

    /// Matrix dimensions are incompatible.
    #[error("Incompatible matrix dimensions: ({rows1}x{cols1}) and ({rows2}x{cols2})")]
    DimensionMismatch {
        /// Rows in first matrix.
        rows1: usize,
        /// Columns in first matrix.
        cols1: usize,
        /// Rows in second matrix.
        rows2: usize,
        /// Columns in second matrix.
        cols2: usize,
    },

    /// Insufficient data points for operation.
    #[error("Insufficient data: need at least {required}, got {actual}")]
    InsufficientData {
        /// Minimum required points.
        required: usize,
        /// Actual number of points.
        actual: usize,
    },

    /// Input contains NaN or infinite values.
    #[error("Non-finite value in {context}")]
    NonFinite {
        /// Where the value was found.
        context: String,
    },

    /// Invalid input parameter.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Description of the invalid input.
        reason: String,
    },

    /// The quadratic program solver terminated without an optimal point.
    #[error("QP solver stopped with status {status} after {iterations} iterations")]
    SolverFailed {
        /// Terminal status reported by the solver.
        status: String,
        /// Iterations performed.
        iterations: u32,
    },
}

impl MathError {
    /// Creates a convergence failed error.
    #[must_use]
    pub fn convergence_failed(iterations: u32, residual: f64) -> Self {
        Self::ConvergenceFailed {
            iterations,
            residual,
        }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates an insufficient data error.
    #[must_use]
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Creates a non-finite value error.
    #[must_use]
    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinite {
            context: context.into(),
        }
    }

    /// Creates a solver failure error.
    #[must_use]
    pub fn solver_failed(status: impl Into<String>, iterations: u32) -> Self {
        Self::SolverFailed {
            status: status.into(),
            iterations,
        }
    }

    /// Returns true if the solver proved the constraint set empty.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::SolverFailed { status, .. } if status.contains("infeasible"))
    }
}
