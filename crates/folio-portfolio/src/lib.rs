//! # Folio Portfolio
//!
//! Portfolio optimization and risk analytics.
//!
//! This crate is the numerical core of the Folio engine. Given price
//! histories (or caller-supplied expected returns and covariance) and a set of
//! allocation constraints, it computes optimal weights under several objective
//! formulations, sweeps the efficient frontier and derives risk metrics.
//!
//! ## Design Philosophy
//!
//! - **Pure functions**: No I/O, no caching, no global state; every input is explicit
//! - **Fail before solving**: Data and constraint problems are reported before any solver runs
//! - **Undefined is not NaN**: Ratios with a vanishing denominator are `None`
//!
//! ## Features
//!
//! - **Preprocessing**: Date alignment, simple or log returns, shrinkage to positive definiteness
//! - **Constraints**: Bounds, sector caps, ESG/liquidity screens, leverage, with a full feasibility report
//! - **Optimizers**: Minimum volatility, mean-variance, maximum Sharpe, Black-Litterman, risk parity
//! - **Efficient Frontier**: Monotone, non-dominated, cancellable sweep
//! - **Risk Analytics**: Volatility, Sharpe, Sortino, VaR/CVaR, drawdown, beta/alpha, tracking error
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use folio_portfolio::prelude::*;
//!
//! let request = OptimizationRequest::new(["AAPL", "MSFT"], OptimizationMethod::MaxSharpe)
//!     .with_constraints(Constraints::new().with_bounds("AAPL", 0.0, 0.6))
//!     .with_risk_free_rate(0.02);
//!
//! let result = optimize_series(&series, None, &request, &AnalyticsConfig::default(), "v1")?;
//! println!("AAPL weight: {:.2}%", result.weight("AAPL") * 100.0);
//! ```
//!
//! ## Module Overview
//!
//! - [`preprocess`] - Return model estimation with shrinkage
//! - [`constraints`] - Constraint types, compilation and feasibility checks
//! - [`optimizers`] - The five optimization methods
//! - [`frontier`] - Efficient frontier generation
//! - [`risk`] - Risk metrics
//! - [`pipeline`] - End-to-end request processing
//! - [`types`] - Requests, results, models and configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod constraints;
pub mod error;
pub mod frontier;
pub mod optimizers;
pub mod pipeline;
pub mod preprocess;
pub mod risk;
pub mod types;

// Re-export error types at crate root
pub use error::{ConstraintCheck, ConstraintViolation, ErrorCode, OptimizerError, OptimizerResult};

pub use constraints::{compile, CompiledConstraints, Constraints, WeightBounds};
pub use frontier::{efficient_frontier, max_return_portfolio};
pub use optimizers::{solve, SolveOutcome};
pub use pipeline::{
    frontier_for_model, frontier_for_series, optimize_model, optimize_series, prepare_model,
    prepare_series, PreparedRequest,
};
pub use preprocess::build_return_model;
pub use risk::compute_metrics;
pub use types::{
    AnalyticsConfig, AssetMetadata, AssetSeries, BlackLittermanParams, Confidence, FrontierPoint,
    LookbackWindow, MethodKind, OptimizationMethod, OptimizationRequest, OptimizationResult,
    PreprocessConfig, PricePoint, ReturnKind, ReturnModel, RiskConfig, RiskMetrics,
    ShrinkageTarget, SolverConfig, SolverDiagnostics, View,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::constraints::{Constraints, WeightBounds};
    pub use crate::error::{ErrorCode, OptimizerError, OptimizerResult};
    pub use crate::pipeline::{frontier_for_model, frontier_for_series, optimize_model, optimize_series};
    pub use crate::types::{
        AnalyticsConfig, AssetMetadata, AssetSeries, BlackLittermanParams, Confidence,
        FrontierPoint, LookbackWindow, MethodKind, OptimizationMethod, OptimizationRequest,
        OptimizationResult, PricePoint, ReturnModel, RiskMetrics, View,
    };
}
