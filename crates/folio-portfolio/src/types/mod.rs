//! Domain types for portfolio optimization.
//!
//! - [`AssetSeries`]: Price history of one asset plus screening attributes
//! - [`ReturnModel`]: Annualized expected returns and covariance
//! - [`OptimizationMethod`]: The five objectives with their parameters
//! - [`OptimizationRequest`] / [`OptimizationResult`]: The request/response contract
//! - [`AnalyticsConfig`]: Numerical parameters

mod config;
mod method;
mod model;
mod request;
mod result;
mod series;

pub use config::{
    AnalyticsConfig, PreprocessConfig, ReturnKind, RiskConfig, ShrinkageTarget, SolverConfig,
};
pub use method::{
    BlackLittermanParams, MethodKind, OptimizationMethod, View, DEFAULT_MARKET_RISK_AVERSION,
    DEFAULT_RISK_AVERSION, DEFAULT_TAU,
};
pub use model::{ReturnHistory, ReturnModel};
pub use request::OptimizationRequest;
pub use result::{Confidence, FrontierPoint, OptimizationResult, RiskMetrics, SolverDiagnostics};
pub use series::{AssetMetadata, AssetSeries, LookbackWindow, PricePoint};
