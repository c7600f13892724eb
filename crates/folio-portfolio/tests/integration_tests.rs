//! Integration tests for folio-portfolio.
//!
//! These tests run complete requests through the pipeline, from price
//! histories or caller-supplied moments to weights and risk metrics.

use chrono::NaiveDate;
use folio_portfolio::optimizers::posterior_returns;
use folio_portfolio::prelude::*;
use folio_portfolio::{build_return_model, ConstraintCheck, PreprocessConfig, ReturnKind, ShrinkageTarget};
use nalgebra::{DMatrix, DVector};

// =============================================================================
// TEST FIXTURES
// =============================================================================

/// Two uncorrelated assets: A with 20% and B with 10% volatility.
fn two_asset_model() -> ReturnModel {
    ReturnModel::from_moments(
        vec![AssetMetadata::new("A"), AssetMetadata::new("B")],
        vec![0.10, 0.05],
        DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.01]),
    )
    .unwrap()
}

/// Four correlated assets across two sectors.
fn sector_model() -> ReturnModel {
    ReturnModel::from_moments(
        vec![
            AssetMetadata::new("AAPL").with_sector("Tech").with_esg_score(72.0),
            AssetMetadata::new("MSFT").with_sector("Tech").with_esg_score(81.0),
            AssetMetadata::new("XOM").with_sector("Energy").with_esg_score(35.0),
            AssetMetadata::new("JNJ").with_sector("Health").with_esg_score(77.0),
        ],
        vec![0.14, 0.12, 0.07, 0.06],
        DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0625, 0.0300, 0.0080, 0.0050, //
                0.0300, 0.0484, 0.0070, 0.0060, //
                0.0080, 0.0070, 0.0441, 0.0040, //
                0.0050, 0.0060, 0.0040, 0.0196,
            ],
        ),
    )
    .unwrap()
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Deterministic daily price paths with distinct drift and noise.
fn price_series() -> Vec<AssetSeries> {
    let specs = [
        ("AAPL", 0.0009, 0.018, 1.3),
        ("MSFT", 0.0007, 0.014, 2.1),
        ("TLT", 0.0002, 0.008, 0.7),
    ];
    specs
        .iter()
        .map(|&(symbol, drift, noise, phase)| {
            let mut price = 100.0;
            let prices: Vec<f64> = (0..250)
                .map(|t| {
                    let shock = noise * ((t as f64) * 0.37 + phase).sin()
                        + 0.5 * noise * ((t as f64) * 1.91 + 2.0 * phase).cos();
                    price *= 1.0 + drift + shock;
                    price
                })
                .collect();
            AssetSeries::from_daily_prices(symbol, start(), &prices)
        })
        .collect()
}

fn assert_valid_weights(result: &OptimizationResult, constraints: &Constraints) {
    assert!((result.total_weight() - constraints.leverage.unwrap_or(1.0)).abs() < 1e-6);
    for (symbol, &w) in &result.weights {
        let bounds = constraints.bounds_for(symbol);
        assert!(w >= bounds.min - 1e-6, "{} below min: {}", symbol, w);
        assert!(w <= bounds.max + 1e-6, "{} above max: {}", symbol, w);
    }
}

// =============================================================================
// END-TO-END
// =============================================================================

#[test]
fn test_two_asset_min_volatility() {
    let request = OptimizationRequest::new(["A", "B"], OptimizationMethod::MinVolatility);
    let result = optimize_model(
        &two_asset_model(),
        &request,
        None,
        &AnalyticsConfig::default(),
        "test",
    )
    .unwrap();

    assert!((result.weight("A") - 0.2).abs() < 1e-6);
    assert!((result.weight("B") - 0.8).abs() < 1e-6);
    assert!((result.volatility - 0.0894).abs() < 1e-4);
    assert!((result.expected_return - 0.06).abs() < 1e-6);
    assert!(result.confidence.is_optimal());
    assert!(result.solver.iterations > 0);
}

#[test]
fn test_price_history_max_sharpe() {
    let series = price_series();
    let constraints = Constraints::new().with_default_bounds(0.0, 0.6);
    let request = OptimizationRequest::new(["TLT", "AAPL", "MSFT"], OptimizationMethod::MaxSharpe)
        .with_constraints(constraints.clone())
        .with_risk_free_rate(0.01);
    let result =
        optimize_series(&series, None, &request, &AnalyticsConfig::default(), "test").unwrap();

    assert_valid_weights(&result, &constraints);
    assert_eq!(result.weights.len(), 3);
    assert!(result.metrics.max_drawdown.is_some());
    assert!(result.metrics.historical_var.is_some());
    assert!(result.metrics.sharpe_ratio.is_some());
    assert!(result.metrics.beta.is_none());
    assert!((result.risk_contributions.values().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_price_history_with_benchmark() {
    let series = price_series();
    let benchmark = series[0].clone();
    let request = OptimizationRequest::new(["AAPL", "MSFT"], OptimizationMethod::MinVolatility)
        .with_benchmark("AAPL");
    let result = optimize_series(
        &series[..2],
        Some(&benchmark),
        &request,
        &AnalyticsConfig::default(),
        "test",
    )
    .unwrap();

    assert!(result.metrics.beta.is_some());
    assert!(result.metrics.alpha.is_some());
    assert!(result.metrics.tracking_error.is_some());
}

#[test]
fn test_log_returns_pipeline() {
    let series = price_series();
    let mut config = AnalyticsConfig::default();
    config.preprocess = config.preprocess.with_return_kind(ReturnKind::Log);
    let request = OptimizationRequest::new(["AAPL", "MSFT", "TLT"], OptimizationMethod::MinVolatility);
    let result = optimize_series(&series, None, &request, &config, "test").unwrap();
    assert!((result.total_weight() - 1.0).abs() < 1e-6);
}

#[test]
fn test_repeated_requests_are_bit_identical() {
    let series = price_series();
    let request = OptimizationRequest::new(["AAPL", "MSFT", "TLT"], OptimizationMethod::MaxSharpe);
    let config = AnalyticsConfig::default();
    let first = optimize_series(&series, None, &request, &config, "test").unwrap();
    let second = optimize_series(&series, None, &request, &config, "test").unwrap();

    for (symbol, w) in &first.weights {
        assert_eq!(w.to_bits(), second.weights[symbol].to_bits());
    }
    assert_eq!(first.volatility.to_bits(), second.volatility.to_bits());
}

#[test]
fn test_insufficient_history() {
    let series = vec![
        AssetSeries::from_daily_prices("A", start(), &[100.0, 101.0]),
        AssetSeries::from_daily_prices("B", start(), &[50.0, 49.0]),
    ];
    let request = OptimizationRequest::new(["A", "B"], OptimizationMethod::MinVolatility);
    let err = optimize_series(&series, None, &request, &AnalyticsConfig::default(), "test")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientData);
    assert!(!err.is_retryable());
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

#[test]
fn test_minimums_exceeding_budget_are_infeasible() {
    let model = ReturnModel::from_moments(
        vec![AssetMetadata::new("A"), AssetMetadata::new("B"), AssetMetadata::new("C")],
        vec![0.08, 0.06, 0.04],
        DMatrix::from_diagonal(&DVector::from_vec(vec![0.04, 0.02, 0.01])),
    )
    .unwrap();
    let constraints = Constraints::new()
        .with_bounds("A", 0.6, 1.0)
        .with_bounds("B", 0.6, 1.0)
        .with_bounds("C", 0.6, 1.0);
    let request = OptimizationRequest::new(["A", "B", "C"], OptimizationMethod::MinVolatility)
        .with_constraints(constraints);

    let err = optimize_model(&model, &request, None, &AnalyticsConfig::default(), "test")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InfeasibleConstraints);
    assert!(err
        .violations()
        .iter()
        .any(|v| v.check == ConstraintCheck::BudgetLower));
}

#[test]
fn test_sector_cap_and_esg_screen() {
    let constraints = Constraints::new()
        .with_sector_cap("Tech", 0.5)
        .with_min_esg_score(50.0);
    let request = OptimizationRequest::new(
        ["AAPL", "MSFT", "XOM", "JNJ"],
        OptimizationMethod::MaxSharpe,
    )
    .with_constraints(constraints.clone())
    .with_risk_free_rate(0.02);
    let result =
        optimize_model(&sector_model(), &request, None, &AnalyticsConfig::default(), "test")
            .unwrap();

    assert_valid_weights(&result, &constraints);
    assert!(result.weight("XOM").abs() < 1e-9);
    assert!(result.weight("AAPL") + result.weight("MSFT") <= 0.5 + 1e-6);
}

#[test]
fn test_every_method_respects_bounds() {
    let constraints = Constraints::new().with_default_bounds(0.05, 0.4);
    let methods = [
        OptimizationMethod::MinVolatility,
        OptimizationMethod::MeanVariance { risk_aversion: 2.0 },
        OptimizationMethod::MaxSharpe,
        OptimizationMethod::BlackLitterman(
            BlackLittermanParams::default().with_view(View::relative("AAPL", "XOM", 0.05)),
        ),
        OptimizationMethod::RiskParity { budgets: None },
    ];
    for method in methods {
        let request = OptimizationRequest::new(["AAPL", "MSFT", "XOM", "JNJ"], method.clone())
            .with_constraints(constraints.clone());
        let result =
            optimize_model(&sector_model(), &request, None, &AnalyticsConfig::default(), "test")
                .unwrap_or_else(|e| panic!("{:?} failed: {}", method.kind(), e));
        assert_valid_weights(&result, &constraints);
        assert_eq!(result.method, method.kind());
    }
}

// =============================================================================
// METHODS
// =============================================================================

#[test]
fn test_max_sharpe_tangency() {
    let request = OptimizationRequest::new(["A", "B"], OptimizationMethod::MaxSharpe)
        .with_risk_free_rate(0.02);
    let result =
        optimize_model(&two_asset_model(), &request, None, &AnalyticsConfig::default(), "test")
            .unwrap();

    assert!((result.weight("A") - 0.4).abs() < 1e-5);
    assert!((result.weight("B") - 0.6).abs() < 1e-5);
    let sharpe = result.metrics.sharpe_ratio.unwrap();
    assert!((sharpe - (0.07 - 0.02) / (0.4f64.powi(2) * 0.04 + 0.6f64.powi(2) * 0.01).sqrt()).abs() < 1e-6);
}

#[test]
fn test_max_sharpe_without_excess_return() {
    let request = OptimizationRequest::new(["A", "B"], OptimizationMethod::MaxSharpe)
        .with_risk_free_rate(0.12);
    let err = optimize_model(&two_asset_model(), &request, None, &AnalyticsConfig::default(), "test")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoPositiveExcessReturn);
}

#[test]
fn test_black_litterman_without_views_returns_prior() {
    let model = sector_model();
    let params = BlackLittermanParams::default();
    let posterior = posterior_returns(&model, &params).unwrap();

    let market = DVector::from_element(4, 0.25);
    let prior = &model.covariance * &market * params.market_risk_aversion;
    for i in 0..4 {
        assert!((posterior[i] - prior[i]).abs() < 1e-12);
    }

    let request = OptimizationRequest::new(
        ["AAPL", "MSFT", "XOM", "JNJ"],
        OptimizationMethod::BlackLitterman(params),
    );
    let result =
        optimize_model(&model, &request, None, &AnalyticsConfig::default(), "test").unwrap();
    let reported = result.posterior_returns.unwrap();
    assert!((reported["XOM"] - prior[2]).abs() < 1e-12);
    for w in result.weights.values() {
        assert!((w - 0.25).abs() < 1e-4);
    }
}

#[test]
fn test_black_litterman_view_tilts_posterior() {
    let model = sector_model();
    let prior = posterior_returns(&model, &BlackLittermanParams::default()).unwrap();
    let params = BlackLittermanParams::default().with_view(View::absolute("JNJ", 0.15));
    let posterior = posterior_returns(&model, &params).unwrap();
    assert!(posterior[3] > prior[3]);
    assert!(posterior[3] < 0.15);
}

#[test]
fn test_risk_parity_inverse_volatility() {
    let request =
        OptimizationRequest::new(["A", "B"], OptimizationMethod::RiskParity { budgets: None });
    let result =
        optimize_model(&two_asset_model(), &request, None, &AnalyticsConfig::default(), "test")
            .unwrap();

    assert!((result.weight("A") - 1.0 / 3.0).abs() < 1e-6);
    assert!((result.weight("B") - 2.0 / 3.0).abs() < 1e-6);
    assert!((result.risk_contributions["A"] - 0.5).abs() < 1e-6);
    assert!(result.confidence.is_optimal());
}

// =============================================================================
// LEVERAGE, SECTOR CAPS AND SHRINKAGE
// =============================================================================

fn levered_tech_capped() -> Constraints {
    Constraints::new()
        .with_leverage(1.3)
        .with_default_bounds(0.0, 0.8)
        .with_sector_cap("Tech", 0.7)
}

fn tech_weight(weights: &std::collections::BTreeMap<String, f64>) -> f64 {
    weights["AAPL"] + weights["MSFT"]
}

#[test]
fn test_levered_max_sharpe_dominates_frontier() {
    let rf = 0.03;
    let constraints = levered_tech_capped();
    let symbols = ["AAPL", "MSFT", "XOM", "JNJ"];
    let model = sector_model();

    let request = OptimizationRequest::new(symbols, OptimizationMethod::MaxSharpe)
        .with_constraints(constraints.clone())
        .with_risk_free_rate(rf);
    let result = optimize_model(&model, &request, None, &AnalyticsConfig::default(), "test").unwrap();
    assert_valid_weights(&result, &constraints);
    assert!(tech_weight(&result.weights) <= 0.7 + 1e-6);

    let tangency = (result.expected_return - rf) / result.volatility;
    assert!((result.metrics.sharpe_ratio.unwrap() - tangency).abs() < 1e-9);

    // Every frontier portfolio is feasible for the same constraints.
    let frontier =
        frontier_for_model(&model, &request, 25, &AnalyticsConfig::default(), || false).unwrap();
    for point in &frontier {
        let sharpe = (point.expected_return - rf) / point.risk;
        assert!(tangency >= sharpe - 1e-6, "frontier point beats tangency: {} > {}", sharpe, tangency);
    }
}

#[test]
fn test_levered_frontier_with_sector_cap() {
    let request = OptimizationRequest::new(
        ["AAPL", "MSFT", "XOM", "JNJ"],
        OptimizationMethod::MinVolatility,
    )
    .with_constraints(levered_tech_capped());
    let frontier =
        frontier_for_model(&sector_model(), &request, 12, &AnalyticsConfig::default(), || false)
            .unwrap();

    assert!(frontier.len() >= 2);
    for point in &frontier {
        assert!((point.weights.values().sum::<f64>() - 1.3).abs() < 1e-6);
        assert!(tech_weight(&point.weights) <= 0.7 + 1e-6);
        assert!(point.weights.values().all(|&w| w <= 0.8 + 1e-6));
    }
    for pair in frontier.windows(2) {
        assert!(pair[1].risk >= pair[0].risk - 1e-12);
        assert!(pair[1].expected_return > pair[0].expected_return);
    }
    // Best allocation: 0.7 AAPL (Tech full), then 0.6 XOM.
    let top = frontier.last().unwrap();
    assert!((top.expected_return - (0.7 * 0.14 + 0.6 * 0.07)).abs() < 1e-6);
}

#[test]
fn test_levered_risk_parity_with_sector_cap() {
    let constraints = levered_tech_capped();
    let request = OptimizationRequest::new(
        ["AAPL", "MSFT", "XOM", "JNJ"],
        OptimizationMethod::RiskParity { budgets: None },
    )
    .with_constraints(constraints.clone());
    let result =
        optimize_model(&sector_model(), &request, None, &AnalyticsConfig::default(), "test")
            .unwrap();
    assert_valid_weights(&result, &constraints);
    assert!(tech_weight(&result.weights) <= 0.7 + 1e-6);
}

#[test]
fn test_constant_correlation_shrinkage_end_to_end() {
    let mut series = price_series();
    // A duplicated path makes the sample covariance singular.
    series.push(AssetSeries::new("AAPL2", series[0].prices.clone()));

    let diagonal = build_return_model(&series, None, &PreprocessConfig::default()).unwrap();
    let preprocess = PreprocessConfig::default().with_shrinkage_target(ShrinkageTarget::ConstantCorrelation);
    let model = build_return_model(&series, None, &preprocess).unwrap();
    assert!(model.shrinkage > 0.0);
    let gap = (&model.covariance - &diagonal.covariance).abs().max();
    assert!(gap > 0.0);

    let mut config = AnalyticsConfig::default();
    config.preprocess = preprocess;
    let symbols = ["AAPL", "AAPL2", "MSFT", "TLT"];
    for method in [
        OptimizationMethod::MinVolatility,
        OptimizationMethod::RiskParity { budgets: None },
    ] {
        let request = OptimizationRequest::new(symbols, method.clone());
        let result = optimize_series(&series, None, &request, &config, "test")
            .unwrap_or_else(|e| panic!("{:?} failed: {}", method.kind(), e));
        assert!((result.total_weight() - 1.0).abs() < 1e-6);
        assert!(result.solver.shrinkage > 0.0);
    }
}

// =============================================================================
// FRONTIER
// =============================================================================

#[test]
fn test_frontier_spans_min_vol_to_max_return() {
    let request = OptimizationRequest::new(
        ["AAPL", "MSFT", "XOM", "JNJ"],
        OptimizationMethod::MinVolatility,
    );
    let frontier =
        frontier_for_model(&sector_model(), &request, 15, &AnalyticsConfig::default(), || false)
            .unwrap();

    assert!(frontier.len() >= 2);
    assert!(frontier.len() <= 15);
    for pair in frontier.windows(2) {
        assert!(pair[1].risk >= pair[0].risk - 1e-12);
        assert!(pair[1].expected_return > pair[0].expected_return);
    }
    let top = frontier.last().unwrap();
    assert!((top.expected_return - 0.14).abs() < 1e-6);
}

#[test]
fn test_frontier_cancelled() {
    let request = OptimizationRequest::new(["A", "B"], OptimizationMethod::MinVolatility);
    let err = frontier_for_model(&two_asset_model(), &request, 10, &AnalyticsConfig::default(), || {
        true
    })
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);
}
