//! Linear algebra utilities.
//!
//! Dense matrix helpers used by the covariance preprocessing and the
//! Black-Litterman posterior. All matrices are `nalgebra` column-major
//! `DMatrix<f64>`.

use crate::error::{MathError, MathResult};
use nalgebra::{DMatrix, DVector};

/// Returns the dimension of a square matrix.
pub fn check_square(matrix: &DMatrix<f64>) -> MathResult<usize> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: matrix.ncols(),
            rows2: matrix.ncols(),
            cols2: n,
        });
    }
    Ok(n)
}

/// Fails with [`MathError::NonFinite`] if any entry is NaN or infinite.
pub fn ensure_finite(matrix: &DMatrix<f64>, context: &str) -> MathResult<()> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(MathError::non_finite(context))
    }
}

/// Checks that a square matrix is symmetric within an absolute tolerance.
///
/// The tolerance is scaled by the largest absolute entry so that annualized
/// covariance matrices and unit-scale matrices are treated alike.
pub fn check_symmetric(matrix: &DMatrix<f64>, tolerance: f64) -> MathResult<()> {
    let n = check_square(matrix)?;
    let scale = matrix.amax().max(1.0);

    let mut worst = (0, 0, 0.0_f64);
    for i in 0..n {
        for j in (i + 1)..n {
            let gap = (matrix[(i, j)] - matrix[(j, i)]).abs();
            if gap > worst.2 {
                worst = (i, j, gap);
            }
        }
    }

    if worst.2 > tolerance * scale {
        return Err(MathError::NotSymmetric {
            row: worst.0,
            col: worst.1,
            gap: worst.2,
        });
    }
    Ok(())
}

/// Returns `(A + Aᵀ) / 2`.
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> MathResult<f64> {
    let n = check_square(matrix)?;
    if n == 0 {
        return Err(MathError::insufficient_data(1, 0));
    }
    ensure_finite(matrix, "eigenvalue input")?;

    let eigen = symmetrize(matrix).symmetric_eigen();
    Ok(eigen.eigenvalues.min())
}

/// Ratio of largest to smallest eigenvalue, `None` when the smallest is not positive.
pub fn condition_number(matrix: &DMatrix<f64>) -> MathResult<Option<f64>> {
    check_square(matrix)?;
    ensure_finite(matrix, "condition number input")?;

    let eigen = symmetrize(matrix).symmetric_eigen();
    let min = eigen.eigenvalues.min();
    let max = eigen.eigenvalues.max();
    Ok((min > 0.0).then(|| max / min))
}

/// Solves `Ax = b` for a symmetric positive definite `A` using Cholesky.
pub fn cholesky_solve(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    let n = check_square(a)?;
    if n != b.len() {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: b.len(),
            cols2: 1,
        });
    }

    let chol = a.clone().cholesky().ok_or(MathError::NotPositiveDefinite {
        min_eigenvalue: min_eigenvalue(a).unwrap_or(f64::NAN),
    })?;
    Ok(chol.solve(b))
}

/// Solves a general linear system `Ax = b` using LU decomposition with partial pivoting.
pub fn solve_linear_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    let n = check_square(a)?;
    if n != b.len() {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: b.len(),
            cols2: 1,
        });
    }

    a.clone().lu().solve(b).ok_or(MathError::SingularMatrix)
}

/// Inverts a square matrix.
///
/// Symmetric positive definite inputs go through Cholesky; anything else
/// falls back to LU.
pub fn invert(matrix: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    check_square(matrix)?;
    ensure_finite(matrix, "matrix inverse input")?;

    if let Some(chol) = matrix.clone().cholesky() {
        return Ok(chol.inverse());
    }
    matrix.clone().try_inverse().ok_or(MathError::SingularMatrix)
}

/// Computes `xᵀ M x`.
pub fn quadratic_form(matrix: &DMatrix<f64>, x: &DVector<f64>) -> f64 {
    x.dot(&(matrix * x))
}
