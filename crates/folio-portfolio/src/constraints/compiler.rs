//! Constraint compilation and feasibility pre-check.

use std::collections::{BTreeMap, HashSet};

use nalgebra::DVector;

use super::Constraints;
use crate::error::{ConstraintCheck, ConstraintViolation, OptimizerError, OptimizerResult};
use crate::types::AssetMetadata;

/// Absolute slack in the feasibility arithmetic.
const FEASIBILITY_SLACK: f64 = 1e-12;

/// One capped sector.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorRow {
    /// Sector name.
    pub sector: String,
    /// Indices of member assets.
    pub members: Vec<usize>,
    /// Maximum total weight.
    pub cap: f64,
}

/// Constraints aligned with the asset order of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledConstraints {
    /// Effective minimum weight per asset (0 for excluded assets).
    pub lower: Vec<f64>,
    /// Effective maximum weight per asset (0 for excluded assets).
    pub upper: Vec<f64>,
    /// Assets removed by ESG or liquidity screens.
    pub excluded: Vec<bool>,
    /// Capped sectors with at least one member.
    pub sector_rows: Vec<SectorRow>,
    /// Net budget `Σ w`.
    pub budget: f64,
    /// Whether negative weights are allowed.
    pub allow_short: bool,
}

impl CompiledConstraints {
    /// Number of assets.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// True when there are no assets.
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Indices of assets not excluded by screens.
    pub fn eligible(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| !self.excluded[i])
    }

    /// Largest violation of budget, bounds or sector caps by `w`.
    pub fn max_violation(&self, w: &DVector<f64>) -> f64 {
        let budget = (w.sum() - self.budget).abs();
        let bounds = (0..self.len())
            .map(|i| (self.lower[i] - w[i]).max(w[i] - self.upper[i]).max(0.0))
            .fold(0.0, f64::max);
        let sectors = self
            .sector_rows
            .iter()
            .map(|row| (row.members.iter().map(|&i| w[i]).sum::<f64>() - row.cap).max(0.0))
            .fold(0.0, f64::max);
        budget.max(bounds).max(sectors)
    }
}

/// Compiles `constraints` for `assets` and checks feasibility.
///
/// All failed checks are collected into a single
/// [`OptimizerError::InfeasibleConstraints`]; no solver is involved.
pub fn compile(
    constraints: &Constraints,
    assets: &[AssetMetadata],
) -> OptimizerResult<CompiledConstraints> {
    let n = assets.len();
    let budget = constraints.budget();
    let mut violations = Vec::new();

    let known: HashSet<&str> = assets.iter().map(|a| a.symbol.as_str()).collect();
    for symbol in constraints.bounds.keys() {
        if !known.contains(symbol.as_str()) {
            violations.push(ConstraintViolation::new(
                ConstraintCheck::UnknownSymbol,
                symbol,
                "bounds given for a symbol outside the request",
            ));
        }
    }

    if !budget.is_finite() || budget <= 0.0 {
        violations.push(ConstraintViolation::new(
            ConstraintCheck::Budget,
            "portfolio",
            format!("leverage must be positive and finite, got {}", budget),
        ));
    }

    let mut lower = vec![0.0; n];
    let mut upper = vec![0.0; n];
    let mut excluded = vec![false; n];

    for (i, asset) in assets.iter().enumerate() {
        let bounds = constraints.bounds_for(&asset.symbol);

        if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min > bounds.max {
            violations.push(ConstraintViolation::new(
                ConstraintCheck::BoundsOrder,
                &asset.symbol,
                format!("min {} must not exceed max {}", bounds.min, bounds.max),
            ));
        }
        if bounds.min < 0.0 && !constraints.allow_short {
            violations.push(ConstraintViolation::new(
                ConstraintCheck::ShortDisallowed,
                &asset.symbol,
                format!("min {} is negative but short selling is disabled", bounds.min),
            ));
        }

        excluded[i] = fails_screen(asset.esg_score, constraints.min_esg_score)
            || fails_screen(asset.liquidity_score, constraints.min_liquidity);

        if excluded[i] {
            if bounds.min > 0.0 {
                violations.push(ConstraintViolation::new(
                    ConstraintCheck::ExcludedMinWeight,
                    &asset.symbol,
                    format!("excluded by screens but min weight is {}", bounds.min),
                ));
            }
        } else {
            lower[i] = bounds.min;
            upper[i] = bounds.max;
        }
    }

    let sum_min: f64 = lower.iter().sum();
    let sum_max: f64 = upper.iter().sum();
    if sum_min > budget + FEASIBILITY_SLACK {
        violations.push(ConstraintViolation::new(
            ConstraintCheck::BudgetLower,
            "portfolio",
            format!("sum of minimum weights {:.6} exceeds budget {:.6}", sum_min, budget),
        ));
    }
    if sum_max < budget - FEASIBILITY_SLACK {
        violations.push(ConstraintViolation::new(
            ConstraintCheck::BudgetUpper,
            "portfolio",
            format!("sum of maximum weights {:.6} is below budget {:.6}", sum_max, budget),
        ));
    }

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, asset) in assets.iter().enumerate() {
        if let Some(sector) = asset.sector.as_deref() {
            if constraints.sector_caps.contains_key(sector) {
                members.entry(sector).or_default().push(i);
            }
        }
    }

    let mut sector_rows = Vec::new();
    let mut capped = vec![false; n];
    let mut reachable = 0.0;
    for (sector, &cap) in &constraints.sector_caps {
        if !cap.is_finite() || cap < 0.0 {
            violations.push(ConstraintViolation::new(
                ConstraintCheck::SectorCap,
                sector,
                format!("cap must be non-negative and finite, got {}", cap),
            ));
            continue;
        }
        let Some(idx) = members.get(sector.as_str()) else {
            continue;
        };

        let sector_min: f64 = idx.iter().map(|&i| lower[i]).sum();
        if sector_min > cap + FEASIBILITY_SLACK {
            violations.push(ConstraintViolation::new(
                ConstraintCheck::SectorCap,
                sector,
                format!("cap {:.6} is below the sector's minimum weights {:.6}", cap, sector_min),
            ));
        }

        let sector_max: f64 = idx.iter().map(|&i| upper[i]).sum();
        reachable += sector_max.min(cap);
        for &i in idx {
            capped[i] = true;
        }
        sector_rows.push(SectorRow {
            sector: sector.clone(),
            members: idx.clone(),
            cap,
        });
    }

    reachable += (0..n).filter(|&i| !capped[i]).map(|i| upper[i]).sum::<f64>();
    if !sector_rows.is_empty() && reachable < budget - FEASIBILITY_SLACK {
        violations.push(ConstraintViolation::new(
            ConstraintCheck::SectorCapacity,
            "portfolio",
            format!(
                "sector caps allow at most {:.6} of a {:.6} budget",
                reachable, budget
            ),
        ));
    }

    if !violations.is_empty() {
        tracing::debug!(failed = violations.len(), "constraint pre-check failed");
        return Err(OptimizerError::InfeasibleConstraints { violations });
    }

    Ok(CompiledConstraints {
        lower,
        upper,
        excluded,
        sector_rows,
        budget,
        allow_short: constraints.allow_short,
    })
}

fn fails_screen(score: Option<f64>, threshold: Option<f64>) -> bool {
    match threshold {
        Some(min) => score.map_or(true, |s| !(s >= min)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn assets(symbols: &[&str]) -> Vec<AssetMetadata> {
        symbols.iter().map(|s| AssetMetadata::new(*s)).collect()
    }

    fn checks(err: &OptimizerError) -> Vec<ConstraintCheck> {
        err.violations().iter().map(|v| v.check).collect()
    }

    #[test]
    fn test_default_compiles() {
        let c = compile(&Constraints::new(), &assets(&["A", "B", "C"])).unwrap();
        assert_eq!(c.lower, vec![0.0; 3]);
        assert_eq!(c.upper, vec![1.0; 3]);
        assert!((c.budget - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.eligible().count(), 3);
    }

    #[test]
    fn test_min_weights_exceed_budget() {
        let constraints = Constraints::new().with_default_bounds(0.6, 1.0);
        let err = compile(&constraints, &assets(&["A", "B", "C"])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InfeasibleConstraints);
        assert_eq!(checks(&err), vec![ConstraintCheck::BudgetLower]);
    }

    #[test]
    fn test_max_weights_below_budget() {
        let constraints = Constraints::new().with_default_bounds(0.0, 0.3);
        let err = compile(&constraints, &assets(&["A", "B", "C"])).unwrap_err();
        assert_eq!(checks(&err), vec![ConstraintCheck::BudgetUpper]);
    }

    #[test]
    fn test_collects_all_failures() {
        let constraints = Constraints::new()
            .with_bounds("A", 0.5, 0.2)
            .with_bounds("B", -0.1, 0.5)
            .with_bounds("ZZZ", 0.0, 1.0);
        let err = compile(&constraints, &assets(&["A", "B"])).unwrap_err();
        let found = checks(&err);
        assert!(found.contains(&ConstraintCheck::UnknownSymbol));
        assert!(found.contains(&ConstraintCheck::BoundsOrder));
        assert!(found.contains(&ConstraintCheck::ShortDisallowed));
    }

    #[test]
    fn test_short_allowed() {
        let constraints = Constraints::new()
            .with_short_selling(true)
            .with_default_bounds(-0.5, 1.5);
        let c = compile(&constraints, &assets(&["A", "B"])).unwrap();
        assert!(c.allow_short);
        assert!((c.lower[0] + 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screens_exclude_assets() {
        let universe = vec![
            AssetMetadata::new("A").with_esg_score(80.0).with_liquidity_score(0.9),
            AssetMetadata::new("B").with_esg_score(20.0).with_liquidity_score(0.9),
            AssetMetadata::new("C").with_liquidity_score(0.9),
        ];
        let constraints = Constraints::new().with_min_esg_score(50.0);
        let c = compile(&constraints, &universe).unwrap();
        assert_eq!(c.excluded, vec![false, true, true]);
        assert_eq!(c.upper, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_excluded_with_min_weight() {
        let universe = vec![
            AssetMetadata::new("A").with_liquidity_score(1.0),
            AssetMetadata::new("B").with_liquidity_score(0.1),
        ];
        let constraints = Constraints::new()
            .with_min_liquidity(0.5)
            .with_bounds("B", 0.1, 1.0);
        let err = compile(&constraints, &universe).unwrap_err();
        assert_eq!(checks(&err), vec![ConstraintCheck::ExcludedMinWeight]);
    }

    #[test]
    fn test_sector_rows() {
        let universe = vec![
            AssetMetadata::new("A").with_sector("Tech"),
            AssetMetadata::new("B").with_sector("Tech"),
            AssetMetadata::new("C").with_sector("Energy"),
        ];
        let constraints = Constraints::new().with_sector_cap("Tech", 0.5);
        let c = compile(&constraints, &universe).unwrap();
        assert_eq!(c.sector_rows.len(), 1);
        assert_eq!(c.sector_rows[0].members, vec![0, 1]);
    }

    #[test]
    fn test_sector_cap_below_minimums() {
        let universe = vec![
            AssetMetadata::new("A").with_sector("Tech"),
            AssetMetadata::new("B").with_sector("Tech"),
            AssetMetadata::new("C"),
        ];
        let constraints = Constraints::new()
            .with_sector_cap("Tech", 0.3)
            .with_bounds("A", 0.2, 1.0)
            .with_bounds("B", 0.2, 1.0);
        let err = compile(&constraints, &universe).unwrap_err();
        assert_eq!(checks(&err), vec![ConstraintCheck::SectorCap]);
    }

    #[test]
    fn test_sector_capacity() {
        let universe = vec![
            AssetMetadata::new("A").with_sector("Tech"),
            AssetMetadata::new("B").with_sector("Tech"),
            AssetMetadata::new("C"),
        ];
        let constraints = Constraints::new()
            .with_sector_cap("Tech", 0.3)
            .with_bounds("C", 0.0, 0.5);
        let err = compile(&constraints, &universe).unwrap_err();
        assert_eq!(checks(&err), vec![ConstraintCheck::SectorCapacity]);
    }

    #[test]
    fn test_max_violation() {
        let c = compile(&Constraints::new().with_default_bounds(0.0, 0.6), &assets(&["A", "B"]))
            .unwrap();
        assert!(c.max_violation(&DVector::from_vec(vec![0.5, 0.5])) < 1e-15);
        assert!((c.max_violation(&DVector::from_vec(vec![0.7, 0.3])) - 0.1).abs() < 1e-12);
    }
}
