//! # Folio Math
//!
//! Numerical building blocks for the Folio portfolio engine.
//!
//! This crate provides:
//!
//! - **Linear Algebra**: Symmetry and definiteness checks, eigenvalues,
//!   Cholesky/LU solves and inverses on `nalgebra` matrices
//! - **Optimization**: A dense convex QP front end over the `clarabel`
//!   interior-point solver and a damped Newton method for barrier objectives
//!
//! ## Design Philosophy
//!
//! - **Numerical Stability**: Definiteness is checked, not assumed
//! - **Explicit Failure**: Non-convergence is an error, never a silent best effort

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod error;
pub mod linear_algebra;
pub mod optimization;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{
        check_symmetric, cholesky_solve, invert, min_eigenvalue, quadratic_form,
        solve_linear_system, symmetrize,
    };
    pub use crate::optimization::{
        damped_newton, ConvexObjective, NewtonConfig, NewtonResult, QpProblem, QpSettings,
        QpSolution, QpStatus,
    };
}

pub use error::{MathError, MathResult};
