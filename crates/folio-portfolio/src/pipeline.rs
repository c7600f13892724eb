//! End-to-end request processing: preprocess, compile, solve, analyze.
//!
//! Models are always reordered to the request's canonical (sorted) symbol
//! order before compiling and solving, so identical requests produce
//! identical inputs regardless of how the symbols were listed.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::info;

use crate::constraints::{compile, CompiledConstraints};
use crate::error::OptimizerResult;
use crate::frontier::efficient_frontier;
use crate::optimizers::solve;
use crate::preprocess::build_return_model;
use crate::risk::{compute_metrics, risk_contributions};
use crate::types::{
    AnalyticsConfig, AssetSeries, FrontierPoint, OptimizationRequest, OptimizationResult,
    ReturnModel,
};

/// Estimates a model from `series` and optimizes it.
pub fn optimize_series(
    series: &[AssetSeries],
    benchmark: Option<&AssetSeries>,
    request: &OptimizationRequest,
    config: &AnalyticsConfig,
    model_version: &str,
) -> OptimizerResult<OptimizationResult> {
    prepare_series(series, request, config)?.optimize(request, benchmark, config, model_version)
}

/// Optimizes a caller-supplied model.
pub fn optimize_model(
    model: &ReturnModel,
    request: &OptimizationRequest,
    benchmark: Option<&AssetSeries>,
    config: &AnalyticsConfig,
    model_version: &str,
) -> OptimizerResult<OptimizationResult> {
    prepare_model(model, request)?.optimize(request, benchmark, config, model_version)
}

/// Estimates a model from `series` and sweeps its efficient frontier.
pub fn frontier_for_series(
    series: &[AssetSeries],
    request: &OptimizationRequest,
    points: usize,
    config: &AnalyticsConfig,
    cancelled: impl Fn() -> bool,
) -> OptimizerResult<Vec<FrontierPoint>> {
    prepare_series(series, request, config)?.frontier(points, config, cancelled)
}

/// Sweeps the efficient frontier of a caller-supplied model.
///
/// The request's method is ignored; its symbols and constraints apply.
pub fn frontier_for_model(
    model: &ReturnModel,
    request: &OptimizationRequest,
    points: usize,
    config: &AnalyticsConfig,
    cancelled: impl Fn() -> bool,
) -> OptimizerResult<Vec<FrontierPoint>> {
    prepare_model(model, request)?.frontier(points, config, cancelled)
}

/// Validates a request and estimates its model from price histories.
pub fn prepare_series(
    series: &[AssetSeries],
    request: &OptimizationRequest,
    config: &AnalyticsConfig,
) -> OptimizerResult<PreparedRequest> {
    request.validate()?;
    let started = Instant::now();
    let model = build_return_model(series, request.lookback.as_ref(), &config.preprocess)?;
    PreparedRequest::new(&model, request, started)
}

/// Validates a request against a caller-supplied model.
pub fn prepare_model(
    model: &ReturnModel,
    request: &OptimizationRequest,
) -> OptimizerResult<PreparedRequest> {
    request.validate()?;
    PreparedRequest::new(model, request, Instant::now())
}

/// A request whose data and constraints passed every pre-solve check.
///
/// Everything that can fail without running a solver has already failed by
/// the time one of these exists.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    model: ReturnModel,
    constraints: CompiledConstraints,
    started: Instant,
}

impl PreparedRequest {
    fn new(model: &ReturnModel, request: &OptimizationRequest, started: Instant) -> OptimizerResult<Self> {
        let model = model.select(&request.canonical_symbols())?;
        let constraints = compile(&request.constraints, &model.assets)?;
        Ok(Self {
            model,
            constraints,
            started,
        })
    }

    /// The model in canonical symbol order.
    pub fn model(&self) -> &ReturnModel {
        &self.model
    }

    /// The compiled constraints, aligned with [`Self::model`].
    pub fn constraints(&self) -> &CompiledConstraints {
        &self.constraints
    }

    /// Solves and analyzes the request.
    pub fn optimize(
        &self,
        request: &OptimizationRequest,
        benchmark: Option<&AssetSeries>,
        config: &AnalyticsConfig,
        model_version: &str,
    ) -> OptimizerResult<OptimizationResult> {
        let model = &self.model;
        let outcome = solve(
            model,
            &self.constraints,
            &request.method,
            request.risk_free_rate,
            &config.solver,
        )?;

        let w = &outcome.weights;
        let metrics = compute_metrics(model, w, request.risk_free_rate, benchmark, &config.risk)?;
        let contributions = match risk_contributions(w, &model.covariance) {
            Some(rc) => model.weights_by_symbol(&rc),
            None => model.symbols().into_iter().map(|s| (s, 0.0)).collect::<BTreeMap<_, _>>(),
        };

        let method = request.method.kind();
        let solve_duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        info!(
            method = %method,
            assets = model.len(),
            volatility = metrics.volatility,
            duration_ms = solve_duration_ms,
            "optimization complete"
        );

        Ok(OptimizationResult {
            weights: model.weights_by_symbol(w),
            expected_return: metrics.expected_return,
            volatility: metrics.volatility,
            risk_contributions: contributions,
            posterior_returns: outcome
                .posterior_returns
                .as_ref()
                .map(|mu| model.weights_by_symbol(mu)),
            metrics,
            method,
            solve_duration_ms,
            confidence: outcome.confidence,
            solver: outcome.diagnostics,
            model_version: model_version.to_string(),
        })
    }

    /// Sweeps the efficient frontier.
    pub fn frontier(
        &self,
        points: usize,
        config: &AnalyticsConfig,
        cancelled: impl Fn() -> bool,
    ) -> OptimizerResult<Vec<FrontierPoint>> {
        let frontier =
            efficient_frontier(&self.model, &self.constraints, points, &config.solver, cancelled)?;
        info!(points = frontier.len(), requested = points, "frontier complete");
        Ok(frontier)
    }
}
