//! Statistics preprocessor.
//!
//! Turns raw price histories into a [`ReturnModel`]:
//!
//! 1. Each series is restricted to the lookback window, sorted by date and
//!    de-duplicated (the last observation of a date wins).
//! 2. Series are aligned on the intersection of their dates.
//! 3. Period returns (simple or log) give the annualized sample mean and
//!    unbiased sample covariance.
//! 4. The covariance is shrunk toward a structured target until its smallest
//!    eigenvalue clears the configured floor.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use folio_math::linear_algebra::{min_eigenvalue, symmetrize};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::{OptimizerError, OptimizerResult};
use crate::types::{
    AssetSeries, LookbackWindow, PreprocessConfig, ReturnHistory, ReturnModel, ShrinkageTarget,
};

/// Subject reported when the aligned set, not a single symbol, is too short.
pub const ALIGNED_HISTORY: &str = "aligned history";

/// Estimates expected returns and a positive definite covariance.
pub fn build_return_model(
    series: &[AssetSeries],
    window: Option<&LookbackWindow>,
    config: &PreprocessConfig,
) -> OptimizerResult<ReturnModel> {
    check_config(config)?;
    if series.is_empty() {
        return Err(OptimizerError::invalid_request("no price series supplied"));
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(series.len());
    for s in series {
        if !seen.insert(s.symbol()) {
            return Err(OptimizerError::invalid_request(format!(
                "duplicate series for {}",
                s.symbol()
            )));
        }
        cleaned.push(clean_series(s, window, config.min_observations)?);
    }

    let dates = aligned_dates(&cleaned);
    let observations = dates.len().saturating_sub(1);
    if observations < config.min_observations {
        return Err(OptimizerError::insufficient_data(
            ALIGNED_HISTORY,
            config.min_observations,
            observations,
        ));
    }

    let prices = DMatrix::from_fn(dates.len(), cleaned.len(), |t, j| cleaned[j][&dates[t]]);
    let history = ReturnHistory {
        dates,
        prices,
        return_kind: config.return_kind,
        periods_per_year: config.periods_per_year,
    };

    let returns = history.asset_returns();
    let (mean, sample) = sample_moments(&returns);
    let mu = mean * config.periods_per_year;
    let sample = symmetrize(&(sample * config.periods_per_year));

    let target = shrinkage_target(&sample, config.shrinkage_target);
    let (covariance, shrinkage) = regularize(&sample, &target, config)?;

    debug!(
        assets = series.len(),
        observations,
        shrinkage,
        "return model estimated"
    );

    Ok(ReturnModel {
        assets: series.iter().map(|s| s.metadata.clone()).collect(),
        mu,
        covariance,
        shrinkage,
        history: Some(history),
    })
}

fn check_config(config: &PreprocessConfig) -> OptimizerResult<()> {
    if !(config.periods_per_year.is_finite() && config.periods_per_year > 0.0) {
        return Err(OptimizerError::invalid_request(
            "periods_per_year must be positive",
        ));
    }
    if config.min_observations < 2 {
        return Err(OptimizerError::invalid_request(
            "min_observations must be at least 2",
        ));
    }
    if !(0.0..=1.0).contains(&config.base_shrinkage)
        || !(config.shrinkage_step > 0.0 && config.shrinkage_step <= 1.0)
    {
        return Err(OptimizerError::invalid_request(
            "shrinkage parameters must lie in [0, 1] with a positive step",
        ));
    }
    Ok(())
}

/// Date-sorted prices of one series, validated and restricted to `window`.
fn clean_series(
    series: &AssetSeries,
    window: Option<&LookbackWindow>,
    min_observations: usize,
) -> OptimizerResult<BTreeMap<NaiveDate, f64>> {
    let mut prices = BTreeMap::new();
    for point in &series.prices {
        if window.is_some_and(|w| !w.contains(point.date)) {
            continue;
        }
        if !(point.price.is_finite() && point.price > 0.0) {
            return Err(OptimizerError::invalid_request(format!(
                "{} has invalid price {} on {}",
                series.symbol(),
                point.price,
                point.date
            )));
        }
        prices.insert(point.date, point.price);
    }

    let returns = prices.len().saturating_sub(1);
    if returns < min_observations {
        return Err(OptimizerError::insufficient_data(
            series.symbol(),
            min_observations,
            returns,
        ));
    }
    Ok(prices)
}

fn aligned_dates(series: &[BTreeMap<NaiveDate, f64>]) -> Vec<NaiveDate> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let mut common: BTreeSet<NaiveDate> = first.keys().copied().collect();
    for s in rest {
        common.retain(|d| s.contains_key(d));
    }
    common.into_iter().collect()
}

/// Column means and unbiased covariance of `returns` (rows are periods).
pub(crate) fn sample_moments(returns: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let t = returns.nrows();
    let n = returns.ncols();
    let mean = DVector::from_fn(n, |j, _| returns.column(j).mean());
    let mut centered = returns.clone();
    for j in 0..n {
        centered.column_mut(j).add_scalar_mut(-mean[j]);
    }
    let denom = (t.max(2) - 1) as f64;
    let covariance = centered.transpose() * &centered / denom;
    (mean, covariance)
}

fn shrinkage_target(sample: &DMatrix<f64>, target: ShrinkageTarget) -> DMatrix<f64> {
    let n = sample.nrows();
    let diag = DMatrix::from_diagonal(&sample.diagonal());
    match target {
        ShrinkageTarget::Diagonal => diag,
        ShrinkageTarget::ConstantCorrelation => {
            let sd: Vec<f64> = (0..n).map(|i| sample[(i, i)].max(0.0).sqrt()).collect();
            let mut total = 0.0;
            let mut pairs = 0usize;
            for i in 0..n {
                for j in (i + 1)..n {
                    if sd[i] > 0.0 && sd[j] > 0.0 {
                        total += sample[(i, j)] / (sd[i] * sd[j]);
                        pairs += 1;
                    }
                }
            }
            let rho = if pairs > 0 { total / pairs as f64 } else { 0.0 };
            DMatrix::from_fn(n, n, |i, j| {
                if i == j {
                    sample[(i, i)]
                } else {
                    rho * sd[i] * sd[j]
                }
            })
        }
    }
}

/// Raises the shrinkage intensity until the matrix is positive definite.
fn regularize(
    sample: &DMatrix<f64>,
    target: &DMatrix<f64>,
    config: &PreprocessConfig,
) -> OptimizerResult<(DMatrix<f64>, f64)> {
    let mut alpha = config.base_shrinkage;
    let mut last_min_eig = f64::NAN;

    for _ in 0..=config.max_shrinkage_iterations {
        let shrunk = sample * (1.0 - alpha) + target * alpha;
        let min_eig = min_eigenvalue(&shrunk).map_err(|e| {
            OptimizerError::degenerate_covariance(f64::NAN, alpha, e.to_string())
        })?;

        if min_eig > config.min_eigenvalue {
            if alpha > config.base_shrinkage {
                warn!(
                    shrinkage = alpha,
                    base = config.base_shrinkage,
                    min_eigenvalue = min_eig,
                    "covariance required extra shrinkage"
                );
            }
            return Ok((shrunk, alpha));
        }

        last_min_eig = min_eig;
        if alpha >= 1.0 {
            break;
        }
        alpha = (alpha + config.shrinkage_step).min(1.0);
    }

    Err(OptimizerError::degenerate_covariance(
        last_min_eig,
        alpha,
        "covariance is not positive definite after maximum shrinkage",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{PricePoint, ReturnKind};
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(symbol: &str, prices: &[f64]) -> AssetSeries {
        AssetSeries::from_daily_prices(symbol, d(1), prices)
    }

    #[test]
    fn test_two_asset_moments() {
        let a = series("A", &[100.0, 110.0, 99.0, 108.9]);
        let b = series("B", &[50.0, 51.0, 52.02, 50.9796]);
        let config = PreprocessConfig::default().with_periods_per_year(1.0);
        let model = build_return_model(&[a, b], None, &config).unwrap();

        // A: +10%, -10%, +10%
        assert_relative_eq!(model.mu[0], 0.1 / 3.0, epsilon = 1e-12);
        let var_a = {
            let m: f64 = 0.1 / 3.0;
            ((0.1 - m).powi(2) * 2.0 + (-0.1 - m).powi(2)) / 2.0
        };
        assert_relative_eq!(model.covariance[(0, 0)], var_a, epsilon = 1e-12);
        assert_eq!(model.shrinkage, 0.0);
        assert_eq!(model.history.as_ref().unwrap().num_returns(), 3);
    }

    #[test]
    fn test_alignment_and_duplicate_dates() {
        let a = AssetSeries::new(
            "A",
            vec![
                PricePoint::new(d(3), 12.0),
                PricePoint::new(d(1), 10.0),
                PricePoint::new(d(2), 99.0),
                PricePoint::new(d(2), 11.0),
                PricePoint::new(d(4), 13.0),
            ],
        );
        let b = series("B", &[20.0, 21.0, 22.0]);
        let model = build_return_model(&[a, b], None, &PreprocessConfig::default()).unwrap();
        let history = model.history.unwrap();
        assert_eq!(history.dates, vec![d(1), d(2), d(3)]);
        assert_relative_eq!(history.prices[(1, 0)], 11.0);
    }

    #[test]
    fn test_short_series_named() {
        let a = series("A", &[1.0, 1.1, 1.2]);
        let b = series("B", &[1.0, 1.1]);
        let err = build_return_model(&[a, b], None, &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err, OptimizerError::insufficient_data("B", 2, 1));
    }

    #[test]
    fn test_short_alignment() {
        let a = series("A", &[1.0, 1.1, 1.2]);
        let b = AssetSeries::from_daily_prices("B", d(3), &[1.0, 1.1, 1.2]);
        let err = build_return_model(&[a, b], None, &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientData);
        assert_eq!(err, OptimizerError::insufficient_data(ALIGNED_HISTORY, 2, 0));
    }

    #[test]
    fn test_invalid_price() {
        let a = series("A", &[1.0, 0.0, 1.2]);
        let err = build_return_model(&[a], None, &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_window() {
        let a = series("A", &[1.0, 2.0, 1.0, 2.0, 3.0]);
        let window = LookbackWindow::between(d(3), d(5));
        let config = PreprocessConfig::default().with_periods_per_year(1.0);
        let model = build_return_model(&[a], Some(&window), &config).unwrap();
        assert_relative_eq!(model.mu[0], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_log_returns() {
        let a = series("A", &[1.0, std::f64::consts::E, 1.0]);
        let config = PreprocessConfig::default()
            .with_return_kind(ReturnKind::Log)
            .with_periods_per_year(1.0);
        let model = build_return_model(&[a], None, &config).unwrap();
        assert_relative_eq!(model.mu[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(model.covariance[(0, 0)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shrinkage_restores_definiteness() {
        // Five assets, three returns: the sample covariance is singular.
        let universe: Vec<AssetSeries> = (0..5)
            .map(|i| {
                let k = i as f64;
                series(
                    &format!("S{}", i),
                    &[100.0, 101.0 + k, 99.0 - 0.5 * k, 102.0 + k * k * 0.1],
                )
            })
            .collect();
        let model = build_return_model(&universe, None, &PreprocessConfig::default()).unwrap();
        assert!(model.shrinkage > 0.0);
        assert!(min_eigenvalue(&model.covariance).unwrap() > 1e-10);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_constant_correlation_target() {
        let sample = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 9.0]);
        let target = shrinkage_target(&sample, ShrinkageTarget::ConstantCorrelation);
        // Correlations: (0,1) = 1, (0,2) = 0, (1,2) = 0.
        let rho = 1.0 / 3.0;
        assert_relative_eq!(target[(0, 0)], 4.0);
        assert_relative_eq!(target[(0, 2)], rho * 2.0 * 3.0, epsilon = 1e-12);
        assert_relative_eq!(target[(1, 0)], rho * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_price_is_degenerate() {
        let a = series("A", &[1.0, 1.0, 1.0, 1.0]);
        let err = build_return_model(&[a], None, &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DegenerateCovariance);
    }
}
