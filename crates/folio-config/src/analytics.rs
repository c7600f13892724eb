//! Validation of the numerical parameters of a solve.

use folio_portfolio::{AnalyticsConfig, PreprocessConfig, RiskConfig, SolverConfig};

use crate::error::{Validate, ValidationError};

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Validate for PreprocessConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !positive(self.periods_per_year) {
            errors.push(ValidationError::with_rule(
                "periods_per_year",
                "Periods per year must be positive",
                "positive",
            ));
        }

        if self.min_observations < 2 {
            errors.push(ValidationError::with_rule(
                "min_observations",
                "At least 2 return observations are required",
                "min_observations",
            ));
        }

        if !(0.0..=1.0).contains(&self.base_shrinkage) {
            errors.push(ValidationError::with_rule(
                "base_shrinkage",
                "Base shrinkage must be between 0 and 1",
                "unit_interval",
            ));
        }

        if !positive(self.shrinkage_step) || self.shrinkage_step > 1.0 {
            errors.push(ValidationError::with_rule(
                "shrinkage_step",
                "Shrinkage step must be in (0, 1]",
                "unit_interval",
            ));
        }

        if self.max_shrinkage_iterations == 0 {
            errors.push(ValidationError::new(
                "max_shrinkage_iterations",
                "At least one shrinkage iteration is required",
            ));
        }

        if !positive(self.min_eigenvalue) {
            errors.push(ValidationError::with_rule(
                "min_eigenvalue",
                "Eigenvalue floor must be positive",
                "positive",
            ));
        }

        errors
    }
}

impl Validate for SolverConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.max_iterations == 0 || self.max_iterations > 10_000 {
            errors.push(ValidationError::with_rule(
                "max_iterations",
                "Max iterations must be between 1 and 10000",
                "valid_iterations",
            ));
        }

        if !positive(self.tolerance) || self.tolerance > 1e-4 {
            errors.push(ValidationError::with_rule(
                "tolerance",
                "Solver tolerance must be between 0 and 1e-4",
                "valid_tolerance",
            ));
        }

        if self.newton_max_iterations == 0 || self.newton_max_iterations > 10_000 {
            errors.push(ValidationError::with_rule(
                "newton_max_iterations",
                "Newton iterations must be between 1 and 10000",
                "valid_iterations",
            ));
        }

        if !positive(self.newton_tolerance) {
            errors.push(ValidationError::with_rule(
                "newton_tolerance",
                "Newton tolerance must be positive",
                "positive",
            ));
        }

        if !positive(self.risk_contribution_tolerance) {
            errors.push(ValidationError::with_rule(
                "risk_contribution_tolerance",
                "Risk contribution tolerance must be positive",
                "positive",
            ));
        }

        if !positive(self.weight_tolerance) || self.weight_tolerance > 1e-3 {
            errors.push(ValidationError::with_rule(
                "weight_tolerance",
                "Weight tolerance must be between 0 and 1e-3",
                "valid_tolerance",
            ));
        }

        if self.frontier_points < 2 {
            errors.push(ValidationError::new(
                "frontier_points",
                "A frontier needs at least 2 points",
            ));
        }

        errors
    }
}

impl Validate for RiskConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            errors.push(ValidationError::with_rule(
                "confidence_level",
                format!(
                    "Confidence level {} must be strictly between 0 and 1",
                    self.confidence_level
                ),
                "open_unit_interval",
            ));
        }

        errors
    }
}

impl Validate for AnalyticsConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let preprocess = self.preprocess.validate().into_iter().map(|e| e.nested("preprocess"));
        let solver = self.solver.validate().into_iter().map(|e| e.nested("solver"));
        let risk = self.risk.validate().into_iter().map(|e| e.nested("risk"));
        preprocess.chain(solver).chain(risk).collect()
    }
}
