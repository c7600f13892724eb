//! Expected returns and covariance of a set of assets.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use folio_math::linear_algebra::{check_square, check_symmetric, min_eigenvalue};
use nalgebra::{DMatrix, DVector};

use super::config::ReturnKind;
use super::series::{AssetMetadata, AssetSeries};
use crate::error::{OptimizerError, OptimizerResult};

/// Relative tolerance for symmetry checks of caller-supplied covariances.
const SYMMETRY_TOLERANCE: f64 = 1e-9;
/// Eigenvalues above `-PSD_TOLERANCE * scale` count as non-negative.
const PSD_TOLERANCE: f64 = 1e-12;

/// Aligned price history behind a [`ReturnModel`].
///
/// Kept so that path-dependent metrics (drawdown, downside deviation,
/// historical VaR, benchmark statistics) use exactly the observations the
/// moments were estimated from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnHistory {
    /// Aligned observation dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Prices, one row per date and one column per asset.
    pub prices: DMatrix<f64>,
    /// Return convention.
    pub return_kind: ReturnKind,
    /// Annualization factor.
    pub periods_per_year: f64,
}

impl ReturnHistory {
    /// Number of return observations.
    pub fn num_returns(&self) -> usize {
        self.dates.len().saturating_sub(1)
    }

    /// Period return between two prices.
    pub fn period_return(&self, from: f64, to: f64) -> f64 {
        match self.return_kind {
            ReturnKind::Simple => to / from - 1.0,
            ReturnKind::Log => (to / from).ln(),
        }
    }

    /// Asset returns, one row per period.
    pub fn asset_returns(&self) -> DMatrix<f64> {
        let rows = self.num_returns();
        let cols = self.prices.ncols();
        DMatrix::from_fn(rows, cols, |t, j| {
            self.period_return(self.prices[(t, j)], self.prices[(t + 1, j)])
        })
    }

    /// Returns of a constant-weight (rebalanced every period) portfolio.
    ///
    /// Asset returns are combined as simple returns; log histories convert
    /// the combined return back with `ln(1 + r)`.
    pub fn portfolio_returns(&self, weights: &DVector<f64>) -> Vec<f64> {
        self.portfolio_returns_on(weights, &(0..self.dates.len()).collect::<Vec<_>>())
    }

    /// Portfolio and benchmark returns over the dates both histories share.
    ///
    /// Returns `None` when fewer than two returns can be paired.
    pub fn paired_with_benchmark(
        &self,
        weights: &DVector<f64>,
        benchmark: &AssetSeries,
    ) -> Option<(Vec<f64>, Vec<f64>)> {
        let bench: BTreeMap<NaiveDate, f64> = benchmark
            .prices
            .iter()
            .filter(|p| p.price.is_finite() && p.price > 0.0)
            .map(|p| (p.date, p.price))
            .collect();

        let rows: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| bench.contains_key(d))
            .map(|(i, _)| i)
            .collect();
        if rows.len() < 3 {
            return None;
        }

        let portfolio = self.portfolio_returns_on(weights, &rows);
        let benchmark_returns = rows
            .windows(2)
            .map(|w| self.period_return(bench[&self.dates[w[0]]], bench[&self.dates[w[1]]]))
            .collect();
        Some((portfolio, benchmark_returns))
    }

    fn portfolio_returns_on(&self, weights: &DVector<f64>, rows: &[usize]) -> Vec<f64> {
        rows.windows(2)
            .map(|w| {
                let simple: f64 = (0..self.prices.ncols())
                    .map(|j| weights[j] * (self.prices[(w[1], j)] / self.prices[(w[0], j)] - 1.0))
                    .sum();
                match self.return_kind {
                    ReturnKind::Simple => simple,
                    // A leveraged book can lose more than everything in a period.
                    ReturnKind::Log => (1.0 + simple).max(f64::MIN_POSITIVE).ln(),
                }
            })
            .collect()
    }

    fn select_columns(&self, columns: &[usize]) -> Self {
        Self {
            dates: self.dates.clone(),
            prices: self.prices.select_columns(columns),
            return_kind: self.return_kind,
            periods_per_year: self.periods_per_year,
        }
    }
}

/// Annualized expected returns and covariance, in asset order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnModel {
    /// Asset attributes, in the order of `mu` and `covariance`.
    pub assets: Vec<AssetMetadata>,
    /// Expected return per asset.
    pub mu: DVector<f64>,
    /// Covariance matrix (symmetric positive semidefinite).
    pub covariance: DMatrix<f64>,
    /// Shrinkage intensity applied during estimation.
    pub shrinkage: f64,
    /// History the moments were estimated from, if any.
    pub history: Option<ReturnHistory>,
}

impl ReturnModel {
    /// Builds a model from caller-supplied moments.
    ///
    /// The covariance is validated (square, finite, symmetric, no negative
    /// eigenvalues) but never modified.
    pub fn from_moments(
        assets: Vec<AssetMetadata>,
        mu: Vec<f64>,
        covariance: DMatrix<f64>,
    ) -> OptimizerResult<Self> {
        let model = Self {
            assets,
            mu: DVector::from_vec(mu),
            covariance,
            shrinkage: 0.0,
            history: None,
        };
        model.validate()?;
        Ok(model)
    }

    /// Attaches the history the moments came from.
    #[must_use]
    pub fn with_history(mut self, history: ReturnHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when the model has no assets.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Asset symbols in model order.
    pub fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    /// Pairs `weights` (model order) with their symbols.
    pub fn weights_by_symbol(&self, weights: &DVector<f64>) -> BTreeMap<String, f64> {
        self.assets
            .iter()
            .zip(weights.iter())
            .map(|(a, &w)| (a.symbol.clone(), w + 0.0))
            .collect()
    }

    /// Position of `symbol`, if present.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.symbol == symbol)
    }

    /// Checks the structural invariants of the model.
    pub fn validate(&self) -> OptimizerResult<()> {
        let n = self.assets.len();
        if n == 0 {
            return Err(OptimizerError::invalid_request("model has no assets"));
        }

        let dim = check_square(&self.covariance).map_err(|e| {
            OptimizerError::degenerate_covariance(f64::NAN, self.shrinkage, e.to_string())
        })?;
        if dim != n || self.mu.len() != n {
            return Err(OptimizerError::invalid_request(format!(
                "model dimensions disagree: {} assets, {} expected returns, {}x{} covariance",
                n,
                self.mu.len(),
                dim,
                dim
            )));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.assets.iter().find(|a| !seen.insert(a.symbol.as_str())) {
            return Err(OptimizerError::invalid_request(format!(
                "duplicate symbol {}",
                dup.symbol
            )));
        }

        if self.mu.iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::invalid_request("expected returns must be finite"));
        }
        if self.covariance.iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::degenerate_covariance(
                f64::NAN,
                self.shrinkage,
                "covariance has non-finite entries",
            ));
        }

        check_symmetric(&self.covariance, SYMMETRY_TOLERANCE).map_err(|e| {
            OptimizerError::degenerate_covariance(f64::NAN, self.shrinkage, e.to_string())
        })?;

        let min_eig = min_eigenvalue(&self.covariance).map_err(|e| {
            OptimizerError::degenerate_covariance(f64::NAN, self.shrinkage, e.to_string())
        })?;
        let scale = self.covariance.amax().max(1.0);
        if min_eig < -PSD_TOLERANCE * scale {
            return Err(OptimizerError::degenerate_covariance(
                min_eig,
                self.shrinkage,
                "covariance has a negative eigenvalue",
            ));
        }

        Ok(())
    }

    /// Returns the model restricted and reordered to `symbols`.
    pub fn select(&self, symbols: &[String]) -> OptimizerResult<Self> {
        let indices = symbols
            .iter()
            .map(|s| {
                self.index_of(s).ok_or_else(|| {
                    OptimizerError::invalid_request(format!("symbol {} is not in the model", s))
                })
            })
            .collect::<OptimizerResult<Vec<_>>>()?;

        Ok(Self {
            assets: indices.iter().map(|&i| self.assets[i].clone()).collect(),
            mu: DVector::from_iterator(indices.len(), indices.iter().map(|&i| self.mu[i])),
            covariance: DMatrix::from_fn(indices.len(), indices.len(), |r, c| {
                self.covariance[(indices[r], indices[c])]
            }),
            shrinkage: self.shrinkage,
            history: self.history.as_ref().map(|h| h.select_columns(&indices)),
        })
    }
}
