//! Numerical parameters for estimation, solving and risk analytics.

use folio_math::optimization::{NewtonConfig, QpSettings};
use serde::{Deserialize, Serialize};

/// How period returns are computed from prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// `p_t / p_{t-1} - 1`
    #[default]
    Simple,
    /// `ln(p_t / p_{t-1})`
    Log,
}

/// Matrix the sample covariance is shrunk toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkageTarget {
    /// Diagonal of the sample covariance.
    #[default]
    Diagonal,
    /// Sample variances with the average pairwise correlation off the diagonal.
    ConstantCorrelation,
}

/// Parameters of the statistics preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Return convention used everywhere returns are derived.
    pub return_kind: ReturnKind,
    /// Periods per year used to annualize mean and covariance.
    pub periods_per_year: f64,
    /// Minimum aligned return observations.
    pub min_observations: usize,
    /// Shrinkage target.
    pub shrinkage_target: ShrinkageTarget,
    /// Initial shrinkage intensity in `[0, 1]`.
    pub base_shrinkage: f64,
    /// Increment applied while the matrix is not positive definite.
    pub shrinkage_step: f64,
    /// Maximum number of increments.
    pub max_shrinkage_iterations: u32,
    /// Smallest eigenvalue accepted as positive definite.
    pub min_eigenvalue: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            return_kind: ReturnKind::Simple,
            periods_per_year: 252.0,
            min_observations: 2,
            shrinkage_target: ShrinkageTarget::Diagonal,
            base_shrinkage: 0.0,
            shrinkage_step: 0.05,
            max_shrinkage_iterations: 25,
            min_eigenvalue: 1e-10,
        }
    }
}

impl PreprocessConfig {
    /// Sets the return convention.
    #[must_use]
    pub fn with_return_kind(mut self, kind: ReturnKind) -> Self {
        self.return_kind = kind;
        self
    }

    /// Sets the annualization factor.
    #[must_use]
    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }

    /// Sets the shrinkage target.
    #[must_use]
    pub fn with_shrinkage_target(mut self, target: ShrinkageTarget) -> Self {
        self.shrinkage_target = target;
        self
    }
}

/// Parameters of the optimization core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Interior-point iteration limit per QP.
    pub max_iterations: u32,
    /// QP gap/feasibility tolerance.
    pub tolerance: f64,
    /// Newton iteration limit for risk parity.
    pub newton_max_iterations: u32,
    /// Newton stopping tolerance (half squared decrement).
    pub newton_tolerance: f64,
    /// Allowed deviation of risk contributions from their budgets before a
    /// risk parity result is flagged approximate.
    pub risk_contribution_tolerance: f64,
    /// Tolerance on budget, bound and sector checks of final weights.
    pub weight_tolerance: f64,
    /// Default number of efficient frontier points.
    pub frontier_points: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-9,
            newton_max_iterations: 100,
            newton_tolerance: 1e-12,
            risk_contribution_tolerance: 1e-3,
            weight_tolerance: 1e-6,
            frontier_points: 30,
        }
    }
}

impl SolverConfig {
    /// QP solver settings.
    pub fn qp_settings(&self) -> QpSettings {
        QpSettings {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }

    /// Newton settings for risk parity.
    pub fn newton_config(&self) -> NewtonConfig {
        NewtonConfig {
            tolerance: self.newton_tolerance,
            max_iterations: self.newton_max_iterations,
            ..NewtonConfig::default()
        }
    }
}

/// Parameters of the risk analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// VaR/CVaR confidence level in `(0, 1)`.
    pub confidence_level: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
        }
    }
}

/// All numerical parameters of a solve.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Preprocessing parameters.
    pub preprocess: PreprocessConfig,
    /// Solver parameters.
    pub solver: SolverConfig,
    /// Risk analytics parameters.
    pub risk: RiskConfig,
}
