//! Portfolio constraints.
//!
//! [`Constraints`] is the user-facing description (bounds keyed by symbol,
//! sector caps, screening thresholds, leverage). [`compile`] turns it into
//! index-aligned arrays for the optimizers and runs the feasibility
//! pre-check.

mod compiler;

pub use compiler::{compile, CompiledConstraints, SectorRow};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Minimum and maximum weight of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    /// Minimum weight.
    pub min: f64,
    /// Maximum weight.
    pub max: f64,
}

impl WeightBounds {
    /// Creates bounds.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Allocation constraints of a request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraints {
    /// Per-symbol bounds overriding `default_bounds`.
    #[serde(default)]
    pub bounds: BTreeMap<String, WeightBounds>,
    /// Bounds of symbols without an explicit entry.
    #[serde(default)]
    pub default_bounds: WeightBounds,
    /// Maximum total weight per sector.
    #[serde(default)]
    pub sector_caps: BTreeMap<String, f64>,
    /// Assets with a lower (or missing) ESG score are excluded.
    #[serde(default)]
    pub min_esg_score: Option<f64>,
    /// Assets with a lower (or missing) liquidity score are excluded.
    #[serde(default)]
    pub min_liquidity: Option<f64>,
    /// Allow negative weights.
    #[serde(default)]
    pub allow_short: bool,
    /// Net budget `Σ w`; 1 when absent.
    #[serde(default)]
    pub leverage: Option<f64>,
}

impl Constraints {
    /// Long-only, fully invested, `[0, 1]` per asset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bounds of one symbol.
    #[must_use]
    pub fn with_bounds(mut self, symbol: impl Into<String>, min: f64, max: f64) -> Self {
        self.bounds.insert(symbol.into(), WeightBounds::new(min, max));
        self
    }

    /// Sets the default bounds.
    #[must_use]
    pub fn with_default_bounds(mut self, min: f64, max: f64) -> Self {
        self.default_bounds = WeightBounds::new(min, max);
        self
    }

    /// Caps the total weight of a sector.
    #[must_use]
    pub fn with_sector_cap(mut self, sector: impl Into<String>, cap: f64) -> Self {
        self.sector_caps.insert(sector.into(), cap);
        self
    }

    /// Excludes assets below an ESG score.
    #[must_use]
    pub fn with_min_esg_score(mut self, score: f64) -> Self {
        self.min_esg_score = Some(score);
        self
    }

    /// Excludes assets below a liquidity score.
    #[must_use]
    pub fn with_min_liquidity(mut self, score: f64) -> Self {
        self.min_liquidity = Some(score);
        self
    }

    /// Enables or disables short selling.
    #[must_use]
    pub fn with_short_selling(mut self, allow: bool) -> Self {
        self.allow_short = allow;
        self
    }

    /// Sets the net budget.
    #[must_use]
    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// Net budget `Σ w`.
    pub fn budget(&self) -> f64 {
        self.leverage.unwrap_or(1.0)
    }

    /// Bounds of `symbol`.
    pub fn bounds_for(&self, symbol: &str) -> WeightBounds {
        self.bounds.get(symbol).copied().unwrap_or(self.default_bounds)
    }

    /// Canonical form used in cache keys.
    ///
    /// Bounds equal to the default are dropped, signed zeros are folded and
    /// a leverage of exactly 1 is treated as absent, so that requests with the
    /// same meaning produce the same key.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let fold = |v: f64| v + 0.0;
        let default_bounds = WeightBounds::new(fold(self.default_bounds.min), fold(self.default_bounds.max));
        Self {
            bounds: self
                .bounds
                .iter()
                .map(|(s, b)| (s.clone(), WeightBounds::new(fold(b.min), fold(b.max))))
                .filter(|(_, b)| *b != default_bounds)
                .collect(),
            default_bounds,
            sector_caps: self
                .sector_caps
                .iter()
                .map(|(s, c)| (s.clone(), fold(*c)))
                .collect(),
            min_esg_score: self.min_esg_score.map(fold),
            min_liquidity: self.min_liquidity.map(fold),
            allow_short: self.allow_short,
            leverage: self.leverage.map(fold).filter(|l| *l != 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Constraints::new();
        assert_eq!(c.bounds_for("ANY"), WeightBounds::new(0.0, 1.0));
        assert!((c.budget() - 1.0).abs() < f64::EPSILON);
        assert!(!c.allow_short);
    }

    #[test]
    fn test_normalized_drops_redundant_entries() {
        let a = Constraints::new()
            .with_bounds("AAPL", 0.0, 1.0)
            .with_bounds("MSFT", -0.0, 0.5)
            .with_leverage(1.0);
        let b = Constraints::new().with_bounds("MSFT", 0.0, 0.5);

        let na = a.normalized();
        assert_eq!(na, b.normalized());
        assert!(!na.bounds.contains_key("AAPL"));
        assert!(na.leverage.is_none());
        assert!(na.bounds["MSFT"].min.is_sign_positive());
    }

    #[test]
    fn test_json_defaults() {
        let c: Constraints = serde_json::from_str(r#"{"sector_caps": {"Tech": 0.4}}"#).unwrap();
        assert_eq!(c.sector_caps["Tech"], 0.4);
        assert_eq!(c.default_bounds, WeightBounds::default());
    }
}
