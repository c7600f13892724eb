//! Optimization algorithms.
//!
//! - [`qp`]: convex quadratic programs with linear equality and inequality rows
//! - [`newton`]: damped Newton for smooth convex objectives with an open domain

pub mod newton;
pub mod qp;

pub use newton::{damped_newton, ConvexObjective, NewtonConfig, NewtonResult};
pub use qp::{QpProblem, QpSettings, QpSolution, QpStatus};
