//! Portfolio risk analytics.
//!
//! Pure functions of weights, expected returns, covariance and, where
//! available, the historical return path and a benchmark path. Ratios whose
//! denominator vanishes are reported as `None` rather than NaN or infinity.
//!
//! Annual figures (`expected_return`, `volatility`, parametric VaR) use the
//! annualized moments; historical VaR/CVaR are one-period figures of the path.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{AssetSeries, ReturnKind, ReturnModel, RiskConfig, RiskMetrics};

/// Denominators at or below this are treated as zero.
const RATIO_EPSILON: f64 = 1e-12;

// =============================================================================
// Moments
// =============================================================================

/// `μᵀw`.
pub fn expected_return(weights: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    mu.dot(weights)
}

/// `√(wᵀΣw)`.
pub fn volatility(weights: &DVector<f64>, covariance: &DMatrix<f64>) -> f64 {
    weights.dot(&(covariance * weights)).max(0.0).sqrt()
}

/// `(return − r_f) / volatility`.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free_rate: f64) -> Option<f64> {
    ratio(expected_return - risk_free_rate, volatility)
}

/// Share of total variance contributed by each asset: `wᵢ(Σw)ᵢ / wᵀΣw`.
///
/// `None` for a zero-variance portfolio.
pub fn risk_contributions(weights: &DVector<f64>, covariance: &DMatrix<f64>) -> Option<DVector<f64>> {
    let marginal = covariance * weights;
    let variance = weights.dot(&marginal);
    if variance <= RATIO_EPSILON * RATIO_EPSILON {
        return None;
    }
    Some(weights.component_mul(&marginal) / variance)
}

// =============================================================================
// Path statistics
// =============================================================================

/// Annualized downside deviation of `returns` below the per-period risk-free
/// rate. `None` for an empty path.
pub fn downside_deviation(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let threshold = risk_free_rate / periods_per_year;
    let mean_square = returns
        .iter()
        .map(|r| (r - threshold).min(0.0).powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    Some((mean_square * periods_per_year).sqrt())
}

/// `(return − r_f) / downside deviation`.
pub fn sortino_ratio(
    expected_return: f64,
    downside_deviation: Option<f64>,
    risk_free_rate: f64,
) -> Option<f64> {
    ratio(expected_return - risk_free_rate, downside_deviation?)
}

/// Largest peak-to-trough fall of cumulative wealth (starting at 1), as a
/// positive fraction. `None` for an empty path.
pub fn max_drawdown(returns: &[f64], kind: ReturnKind) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for &r in returns {
        wealth *= match kind {
            ReturnKind::Simple => 1.0 + r,
            ReturnKind::Log => r.exp(),
        };
        peak = peak.max(wealth);
        worst = worst.max((peak - wealth) / peak);
    }
    Some(worst)
}

// =============================================================================
// Value at risk
// =============================================================================

fn standard_normal() -> OptimizerResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| OptimizerError::invalid_request(e.to_string()))
}

fn check_confidence(confidence: f64) -> OptimizerResult<()> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(OptimizerError::invalid_request(format!(
            "confidence level must lie in (0, 1), got {}",
            confidence
        )))
    }
}

/// Normal value at risk: `−(return − z_p · volatility)`, 0 for a riskless
/// portfolio.
pub fn parametric_var(expected_return: f64, volatility: f64, confidence: f64) -> OptimizerResult<f64> {
    check_confidence(confidence)?;
    if volatility <= 0.0 {
        return Ok(0.0);
    }
    let z = standard_normal()?.inverse_cdf(confidence);
    Ok(-(expected_return - z * volatility))
}

/// Normal expected shortfall: `−(return − volatility · φ(z_p) / (1 − p))`,
/// 0 for a riskless portfolio.
pub fn parametric_cvar(expected_return: f64, volatility: f64, confidence: f64) -> OptimizerResult<f64> {
    check_confidence(confidence)?;
    if volatility <= 0.0 {
        return Ok(0.0);
    }
    let normal = standard_normal()?;
    let z = normal.inverse_cdf(confidence);
    Ok(-(expected_return - volatility * normal.pdf(z) / (1.0 - confidence)))
}

fn sorted_tail(returns: &[f64], confidence: f64) -> Option<(Vec<f64>, usize)> {
    if returns.is_empty() || !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Some((sorted, index))
}

/// Empirical one-period VaR: the negated `(1 − p)` quantile of `returns`.
pub fn historical_var(returns: &[f64], confidence: f64) -> Option<f64> {
    let (sorted, index) = sorted_tail(returns, confidence)?;
    Some(-sorted[index])
}

/// Empirical one-period expected shortfall: the negated mean of the returns
/// at or below the VaR quantile.
pub fn historical_cvar(returns: &[f64], confidence: f64) -> Option<f64> {
    let (sorted, index) = sorted_tail(returns, confidence)?;
    let tail = &sorted[..=index];
    Some(-tail.iter().sum::<f64>() / tail.len() as f64)
}

// =============================================================================
// Benchmark statistics
// =============================================================================

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (ma, mb) = (mean(a), mean(b));
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    Some(sum / (a.len() - 1) as f64)
}

/// `Cov(p, b) / Var(b)` over paired period returns.
pub fn beta(portfolio: &[f64], benchmark: &[f64]) -> Option<f64> {
    ratio(
        sample_covariance(portfolio, benchmark)?,
        sample_covariance(benchmark, benchmark)?,
    )
}

/// Jensen's alpha: `R_p − (r_f + β (R_b − r_f))` with annualized path means.
pub fn alpha(
    portfolio: &[f64],
    benchmark: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Option<f64> {
    let b = beta(portfolio, benchmark)?;
    let rp = mean(portfolio) * periods_per_year;
    let rb = mean(benchmark) * periods_per_year;
    Some(rp - (risk_free_rate + b * (rb - risk_free_rate)))
}

fn active_returns(portfolio: &[f64], benchmark: &[f64]) -> Option<Vec<f64>> {
    if portfolio.len() != benchmark.len() || portfolio.len() < 2 {
        return None;
    }
    Some(portfolio.iter().zip(benchmark).map(|(p, b)| p - b).collect())
}

/// Annualized standard deviation of active returns.
pub fn tracking_error(portfolio: &[f64], benchmark: &[f64], periods_per_year: f64) -> Option<f64> {
    let active = active_returns(portfolio, benchmark)?;
    let variance = sample_covariance(&active, &active)?;
    Some((variance.max(0.0) * periods_per_year).sqrt())
}

/// Annualized mean active return over tracking error.
pub fn information_ratio(portfolio: &[f64], benchmark: &[f64], periods_per_year: f64) -> Option<f64> {
    let active = active_returns(portfolio, benchmark)?;
    let te = tracking_error(portfolio, benchmark, periods_per_year)?;
    ratio(mean(&active) * periods_per_year, te)
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.abs() <= RATIO_EPSILON || !numerator.is_finite() || !denominator.is_finite() {
        None
    } else {
        Some(numerator / denominator)
    }
}

// =============================================================================
// Full report
// =============================================================================

/// All metrics of `weights` (model order) under `model`.
pub fn compute_metrics(
    model: &ReturnModel,
    weights: &DVector<f64>,
    risk_free_rate: f64,
    benchmark: Option<&AssetSeries>,
    config: &RiskConfig,
) -> OptimizerResult<RiskMetrics> {
    let confidence = config.confidence_level;
    let ret = expected_return(weights, &model.mu);
    let vol = volatility(weights, &model.covariance);

    let mut metrics = RiskMetrics {
        expected_return: ret,
        volatility: vol,
        sharpe_ratio: sharpe_ratio(ret, vol, risk_free_rate),
        value_at_risk: parametric_var(ret, vol, confidence)?,
        conditional_value_at_risk: parametric_cvar(ret, vol, confidence)?,
        confidence_level: confidence,
        ..RiskMetrics::default()
    };

    let Some(history) = &model.history else {
        return Ok(metrics);
    };

    let path = history.portfolio_returns(weights);
    let ppy = history.periods_per_year;
    metrics.downside_deviation = downside_deviation(&path, risk_free_rate, ppy);
    metrics.sortino_ratio = sortino_ratio(ret, metrics.downside_deviation, risk_free_rate);
    metrics.historical_var = historical_var(&path, confidence);
    metrics.historical_cvar = historical_cvar(&path, confidence);
    metrics.max_drawdown = max_drawdown(&path, history.return_kind);

    if let Some((p, b)) = benchmark.and_then(|s| history.paired_with_benchmark(weights, s)) {
        metrics.beta = beta(&p, &b);
        metrics.alpha = alpha(&p, &b, risk_free_rate, ppy);
        metrics.tracking_error = tracking_error(&p, &b, ppy);
        metrics.information_ratio = information_ratio(&p, &b, ppy);
    }

    Ok(metrics)
}
