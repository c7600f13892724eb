//! Optimization methods and their parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OptimizerError;

/// Default risk aversion for mean-variance when none is given.
pub const DEFAULT_RISK_AVERSION: f64 = 1.0;
/// Default Black-Litterman market risk aversion (δ).
pub const DEFAULT_MARKET_RISK_AVERSION: f64 = 2.5;
/// Default Black-Litterman prior uncertainty scale (τ).
pub const DEFAULT_TAU: f64 = 0.05;

/// Method identifier without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Minimum volatility.
    MinVolatility,
    /// Mean-variance utility.
    MeanVariance,
    /// Maximum Sharpe ratio.
    MaxSharpe,
    /// Black-Litterman posterior fed into mean-variance.
    BlackLitterman,
    /// Equal (or budgeted) risk contribution.
    RiskParity,
}

impl MethodKind {
    /// All methods.
    pub const ALL: [MethodKind; 5] = [
        Self::MinVolatility,
        Self::MeanVariance,
        Self::MaxSharpe,
        Self::BlackLitterman,
        Self::RiskParity,
    ];

    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinVolatility => "min_volatility",
            Self::MeanVariance => "mean_variance",
            Self::MaxSharpe => "max_sharpe",
            Self::BlackLitterman => "black_litterman",
            Self::RiskParity => "risk_parity",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == id)
            .ok_or_else(|| OptimizerError::invalid_request(format!("unknown method '{}'", s)))
    }
}

/// An investor view on a linear combination of assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Pick coefficients by symbol.
    pub weights: BTreeMap<String, f64>,
    /// Expected return of the combination.
    pub expected_return: f64,
    /// View uncertainty; derived from the prior when absent.
    #[serde(default)]
    pub variance: Option<f64>,
}

impl View {
    /// Absolute view: `symbol` returns `expected_return`.
    pub fn absolute(symbol: impl Into<String>, expected_return: f64) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(symbol.into(), 1.0);
        Self {
            weights,
            expected_return,
            variance: None,
        }
    }

    /// Relative view: `long` outperforms `short` by `spread`.
    pub fn relative(long: impl Into<String>, short: impl Into<String>, spread: f64) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(long.into(), 1.0);
        weights.insert(short.into(), -1.0);
        Self {
            weights,
            expected_return: spread,
            variance: None,
        }
    }

    /// Sets an explicit view variance.
    #[must_use]
    pub fn with_variance(mut self, variance: f64) -> Self {
        self.variance = Some(variance);
        self
    }
}

fn default_delta() -> f64 {
    DEFAULT_MARKET_RISK_AVERSION
}

fn default_tau() -> f64 {
    DEFAULT_TAU
}

/// Black-Litterman parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackLittermanParams {
    /// Market risk aversion δ used for implied returns.
    #[serde(default = "default_delta")]
    pub market_risk_aversion: f64,
    /// Prior uncertainty scale τ.
    #[serde(default = "default_tau")]
    pub tau: f64,
    /// Market-cap weights by symbol; equal weights when absent.
    #[serde(default)]
    pub market_weights: Option<BTreeMap<String, f64>>,
    /// Investor views.
    #[serde(default)]
    pub views: Vec<View>,
    /// Risk aversion of the final mean-variance step; `δ / 2` when absent.
    #[serde(default)]
    pub risk_aversion: Option<f64>,
}

impl Default for BlackLittermanParams {
    fn default() -> Self {
        Self {
            market_risk_aversion: DEFAULT_MARKET_RISK_AVERSION,
            tau: DEFAULT_TAU,
            market_weights: None,
            views: Vec::new(),
            risk_aversion: None,
        }
    }
}

impl BlackLittermanParams {
    /// Adds a view.
    #[must_use]
    pub fn with_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    /// Sets market weights.
    #[must_use]
    pub fn with_market_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.market_weights = Some(weights);
        self
    }

    /// Risk aversion of the mean-variance step.
    pub fn effective_risk_aversion(&self) -> f64 {
        self.risk_aversion
            .unwrap_or(self.market_risk_aversion / 2.0)
    }
}

/// Optimization method with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// Minimize `wᵀΣw`.
    MinVolatility,
    /// Minimize `λ wᵀΣw − μᵀw`.
    MeanVariance {
        /// Risk aversion λ > 0.
        risk_aversion: f64,
    },
    /// Maximize `(μᵀw − r_f) / √(wᵀΣw)`.
    MaxSharpe,
    /// Mean-variance on the Black-Litterman posterior returns.
    BlackLitterman(BlackLittermanParams),
    /// Risk contributions proportional to budgets.
    RiskParity {
        /// Risk budgets by symbol; equal when absent.
        #[serde(default)]
        budgets: Option<BTreeMap<String, f64>>,
    },
}

impl OptimizationMethod {
    /// Method identifier.
    pub fn kind(&self) -> MethodKind {
        match self {
            Self::MinVolatility => MethodKind::MinVolatility,
            Self::MeanVariance { .. } => MethodKind::MeanVariance,
            Self::MaxSharpe => MethodKind::MaxSharpe,
            Self::BlackLitterman(_) => MethodKind::BlackLitterman,
            Self::RiskParity { .. } => MethodKind::RiskParity,
        }
    }

    /// Method with default parameters.
    pub fn with_defaults(kind: MethodKind) -> Self {
        match kind {
            MethodKind::MinVolatility => Self::MinVolatility,
            MethodKind::MeanVariance => Self::MeanVariance {
                risk_aversion: DEFAULT_RISK_AVERSION,
            },
            MethodKind::MaxSharpe => Self::MaxSharpe,
            MethodKind::BlackLitterman => Self::BlackLitterman(BlackLittermanParams::default()),
            MethodKind::RiskParity => Self::RiskParity { budgets: None },
        }
    }
}

impl FromStr for OptimizationMethod {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<MethodKind>().map(Self::with_defaults)
    }
}
