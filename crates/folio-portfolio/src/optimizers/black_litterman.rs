//! Black-Litterman posterior returns.
//!
//! Implied equilibrium returns `Π = δΣw_mkt` are blended with investor views
//! `Pμ = Q + ε, ε ~ N(0, Ω)`:
//!
//! ```text
//! μ_BL = [(τΣ)⁻¹ + PᵀΩ⁻¹P]⁻¹ [(τΣ)⁻¹Π + PᵀΩ⁻¹Q]
//! ```
//!
//! The posterior then drives a mean-variance solve.

use folio_math::linear_algebra::{cholesky_solve, invert, solve_linear_system};
use nalgebra::{DMatrix, DVector};

use super::mean_variance::mean_variance_with_returns;
use super::SolveOutcome;
use crate::constraints::CompiledConstraints;
use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{BlackLittermanParams, MethodKind, ReturnModel, SolverConfig};

const METHOD: MethodKind = MethodKind::BlackLitterman;

/// Black-Litterman allocation: posterior returns fed into mean-variance.
pub fn black_litterman(
    model: &ReturnModel,
    constraints: &CompiledConstraints,
    params: &BlackLittermanParams,
    config: &SolverConfig,
) -> OptimizerResult<SolveOutcome> {
    let posterior = posterior_returns(model, params)?;
    let mut outcome = mean_variance_with_returns(
        METHOD,
        model,
        &posterior,
        constraints,
        params.effective_risk_aversion(),
        config,
    )?;
    outcome.posterior_returns = Some(posterior);
    Ok(outcome)
}

/// Posterior expected returns in model order.
pub fn posterior_returns(
    model: &ReturnModel,
    params: &BlackLittermanParams,
) -> OptimizerResult<DVector<f64>> {
    check_positive("market risk aversion", params.market_risk_aversion)?;
    check_positive("tau", params.tau)?;

    let sigma = &model.covariance;
    let market = market_weights(model, params)?;
    let prior = sigma * &market * params.market_risk_aversion;

    if params.views.is_empty() {
        return Ok(prior);
    }

    let n = model.len();
    let k = params.views.len();
    let mut pick = DMatrix::zeros(k, n);
    let mut q = DVector::zeros(k);
    for (row, view) in params.views.iter().enumerate() {
        if view.weights.is_empty() {
            return Err(OptimizerError::invalid_request(format!(
                "view {} has no assets",
                row
            )));
        }
        for (symbol, &coefficient) in &view.weights {
            let col = model.index_of(symbol).ok_or_else(|| {
                OptimizerError::invalid_request(format!("view references unknown symbol {}", symbol))
            })?;
            pick[(row, col)] = coefficient;
        }
        q[row] = view.expected_return;
    }
    if pick.iter().chain(q.iter()).any(|v| !v.is_finite()) {
        return Err(OptimizerError::invalid_request("views must be finite"));
    }

    let tau_sigma = sigma * params.tau;
    let implied = &pick * &tau_sigma * pick.transpose();
    let mut omega_inv = DVector::zeros(k);
    for (row, view) in params.views.iter().enumerate() {
        let omega = view.variance.unwrap_or(implied[(row, row)]);
        if !(omega.is_finite() && omega > 0.0) {
            return Err(OptimizerError::invalid_request(format!(
                "view {} has non-positive uncertainty {}",
                row, omega
            )));
        }
        omega_inv[row] = 1.0 / omega;
    }

    let tau_sigma_inv = invert(&tau_sigma)
        .map_err(|e| OptimizerError::degenerate_covariance(f64::NAN, model.shrinkage, e.to_string()))?;
    let pt_omega_inv = pick.transpose() * DMatrix::from_diagonal(&omega_inv);

    let lhs = &tau_sigma_inv + &pt_omega_inv * &pick;
    let rhs = &tau_sigma_inv * &prior + &pt_omega_inv * &q;

    cholesky_solve(&lhs, &rhs)
        .or_else(|_| solve_linear_system(&lhs, &rhs))
        .map_err(|e| OptimizerError::degenerate_covariance(f64::NAN, model.shrinkage, e.to_string()))
}

fn check_positive(name: &str, value: f64) -> OptimizerResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OptimizerError::optimization_failed(
            METHOD.as_str(),
            "invalid_parameter",
            format!("{} must be positive, got {}", name, value),
        ))
    }
}

/// Market weights in model order, normalized to sum to 1.
fn market_weights(model: &ReturnModel, params: &BlackLittermanParams) -> OptimizerResult<DVector<f64>> {
    let n = model.len();
    let Some(by_symbol) = &params.market_weights else {
        return Ok(DVector::from_element(n, 1.0 / n as f64));
    };

    let mut w = DVector::zeros(n);
    for (symbol, &weight) in by_symbol {
        let i = model.index_of(symbol).ok_or_else(|| {
            OptimizerError::invalid_request(format!(
                "market weight given for unknown symbol {}",
                symbol
            ))
        })?;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(OptimizerError::invalid_request(format!(
                "market weight of {} must be non-negative, got {}",
                symbol, weight
            )));
        }
        w[i] = weight;
    }

    let total = w.sum();
    if !(total > 0.0) {
        return Err(OptimizerError::invalid_request("market weights sum to zero"));
    }
    Ok(w / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{compile, Constraints};
    use crate::types::{AssetMetadata, View};
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn model() -> ReturnModel {
        ReturnModel::from_moments(
            vec![
                AssetMetadata::new("A"),
                AssetMetadata::new("B"),
                AssetMetadata::new("C"),
            ],
            vec![0.08, 0.06, 0.04],
            DMatrix::from_row_slice(
                3,
                3,
                &[0.04, 0.006, 0.002, 0.006, 0.0225, 0.003, 0.002, 0.003, 0.01],
            ),
        )
        .unwrap()
    }

    fn market() -> BTreeMap<String, f64> {
        [("A", 5.0), ("B", 3.0), ("C", 2.0)]
            .into_iter()
            .map(|(s, w)| (s.to_string(), w))
            .collect()
    }

    #[test]
    fn test_no_views_gives_implied_returns() {
        let m = model();
        let params = BlackLittermanParams::default().with_market_weights(market());
        let mu = posterior_returns(&m, &params).unwrap();
        let w = DVector::from_vec(vec![0.5, 0.3, 0.2]);
        let pi = &m.covariance * w * 2.5;
        for i in 0..3 {
            assert_relative_eq!(mu[i], pi[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_no_views_recovers_market_portfolio() {
        let m = model();
        let params = BlackLittermanParams::default().with_market_weights(market());
        let c = compile(&Constraints::new(), &m.assets).unwrap();
        let out = black_litterman(&m, &c, &params, &SolverConfig::default()).unwrap();
        assert_relative_eq!(out.weights[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(out.weights[1], 0.3, epsilon = 1e-5);
        assert_relative_eq!(out.weights[2], 0.2, epsilon = 1e-5);
        assert!(out.posterior_returns.is_some());
    }

    #[test]
    fn test_vague_view_barely_moves_prior() {
        let m = model();
        let base = BlackLittermanParams::default();
        let prior = posterior_returns(&m, &base).unwrap();
        let vague = base.with_view(View::absolute("A", 0.50).with_variance(1e12));
        let mu = posterior_returns(&m, &vague).unwrap();
        for i in 0..3 {
            assert_relative_eq!(mu[i], prior[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_confident_view_dominates() {
        let m = model();
        let params =
            BlackLittermanParams::default().with_view(View::absolute("C", 0.20).with_variance(1e-10));
        let mu = posterior_returns(&m, &params).unwrap();
        assert_relative_eq!(mu[2], 0.20, epsilon = 1e-6);
    }

    #[test]
    fn test_relative_view_shifts_spread() {
        let m = model();
        let base = BlackLittermanParams::default();
        let prior = posterior_returns(&m, &base).unwrap();
        let params = base.with_view(View::relative("C", "A", 0.05));
        let mu = posterior_returns(&m, &params).unwrap();
        assert!(mu[2] - mu[0] > prior[2] - prior[0]);
    }

    #[test]
    fn test_unknown_view_symbol() {
        let params = BlackLittermanParams::default().with_view(View::absolute("ZZZ", 0.1));
        let err = posterior_returns(&model(), &params).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidRequest);
    }
}
