//! Error types for portfolio optimization.
//!
//! Every failure carries a stable machine-readable [`ErrorCode`] so that
//! callers can branch on the kind of failure without parsing messages.
//! Errors are `Clone` because a single failed solve is reported to every
//! caller waiting on the same request.

use std::fmt;

use folio_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Too few aligned observations.
    InsufficientData,
    /// Covariance could not be regularized to positive definite.
    DegenerateCovariance,
    /// Constraint set is empty.
    InfeasibleConstraints,
    /// No asset beats the risk-free rate.
    NoPositiveExcessReturn,
    /// Solver did not converge or failed numerically.
    OptimizationFailed,
    /// A market data collaborator failed.
    MarketDataUnavailable,
    /// Worker pool is saturated.
    OverCapacity,
    /// Malformed request.
    InvalidRequest,
    /// Caller cancelled the request.
    Cancelled,
}

impl ErrorCode {
    /// Stable string form, e.g. `INFEASIBLE_CONSTRAINTS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientData => "INSUFFICIENT_DATA",
            Self::DegenerateCovariance => "DEGENERATE_COVARIANCE",
            Self::InfeasibleConstraints => "INFEASIBLE_CONSTRAINTS",
            Self::NoPositiveExcessReturn => "NO_POSITIVE_EXCESS_RETURN",
            Self::OptimizationFailed => "OPTIMIZATION_FAILED",
            Self::MarketDataUnavailable => "MARKET_DATA_UNAVAILABLE",
            Self::OverCapacity => "OVER_CAPACITY",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which feasibility check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCheck {
    /// `min > max` or a non-finite bound.
    BoundsOrder,
    /// Negative minimum weight without short selling.
    ShortDisallowed,
    /// An asset excluded by ESG/liquidity screens has a positive minimum.
    ExcludedMinWeight,
    /// Sum of minimum weights exceeds the budget.
    BudgetLower,
    /// Sum of maximum weights is below the budget.
    BudgetUpper,
    /// Budget (leverage) is not a positive finite number.
    Budget,
    /// Sector cap is invalid or below the sector's minimum weights.
    SectorCap,
    /// Sector caps leave too little room to reach the budget.
    SectorCapacity,
    /// Bounds reference a symbol outside the request.
    UnknownSymbol,
}

impl ConstraintCheck {
    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoundsOrder => "bounds_order",
            Self::ShortDisallowed => "short_disallowed",
            Self::ExcludedMinWeight => "excluded_min_weight",
            Self::BudgetLower => "budget_lower",
            Self::BudgetUpper => "budget_upper",
            Self::Budget => "budget",
            Self::SectorCap => "sector_cap",
            Self::SectorCapacity => "sector_capacity",
            Self::UnknownSymbol => "unknown_symbol",
        }
    }
}

/// One failed feasibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    /// The check that failed.
    pub check: ConstraintCheck,
    /// Symbol, sector or `portfolio` the check applies to.
    pub subject: String,
    /// Human-readable detail.
    pub detail: String,
}

impl ConstraintViolation {
    /// Creates a violation.
    pub fn new(check: ConstraintCheck, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.check.as_str(), self.subject, self.detail)
    }
}

fn join_violations(violations: &[ConstraintViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during optimization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// Not enough observations to estimate moments.
    #[error("Insufficient data for {subject}: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Symbol or `aligned history`.
        subject: String,
        /// Minimum observations required.
        required: usize,
        /// Observations available.
        actual: usize,
    },

    /// Covariance stayed non-positive-definite after maximum shrinkage,
    /// or a caller-supplied covariance was malformed.
    #[error("Degenerate covariance: min eigenvalue {min_eigenvalue:.3e} at shrinkage {shrinkage:.2} ({detail})")]
    DegenerateCovariance {
        /// Smallest eigenvalue of the last matrix tried.
        min_eigenvalue: f64,
        /// Shrinkage intensity of the last matrix tried.
        shrinkage: f64,
        /// What was wrong.
        detail: String,
    },

    /// The constraint set is empty.
    #[error("Infeasible constraints: {}", join_violations(.violations))]
    InfeasibleConstraints {
        /// Every check that failed.
        violations: Vec<ConstraintViolation>,
    },

    /// Maximum Sharpe requested but nothing beats the risk-free rate.
    #[error("No feasible portfolio has expected return above the risk-free rate {risk_free_rate:.4} (best {best_expected_return:.4})")]
    NoPositiveExcessReturn {
        /// Risk-free rate of the request.
        risk_free_rate: f64,
        /// Highest expected return reachable under the constraints.
        best_expected_return: f64,
    },

    /// Solver did not converge, failed numerically, or produced an
    /// allocation that does not satisfy the constraints.
    #[error("Optimization failed ({method}): {status}: {detail}")]
    OptimizationFailed {
        /// Method identifier.
        method: String,
        /// Solver status, e.g. `max_iterations`.
        status: String,
        /// Additional detail.
        detail: String,
    },

    /// Market data collaborator failed.
    #[error("Market data unavailable: {reason}")]
    MarketDataUnavailable {
        /// Why the data could not be obtained.
        reason: String,
    },

    /// Worker pool queue is full. Retryable.
    #[error("Over capacity: {queued} jobs queued (limit {limit})")]
    OverCapacity {
        /// Jobs waiting when the request arrived.
        queued: usize,
        /// Configured queue limit.
        limit: usize,
    },

    /// Malformed request.
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong.
        reason: String,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,
}

impl OptimizerError {
    /// Returns the machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InsufficientData { .. } => ErrorCode::InsufficientData,
            Self::DegenerateCovariance { .. } => ErrorCode::DegenerateCovariance,
            Self::InfeasibleConstraints { .. } => ErrorCode::InfeasibleConstraints,
            Self::NoPositiveExcessReturn { .. } => ErrorCode::NoPositiveExcessReturn,
            Self::OptimizationFailed { .. } => ErrorCode::OptimizationFailed,
            Self::MarketDataUnavailable { .. } => ErrorCode::MarketDataUnavailable,
            Self::OverCapacity { .. } => ErrorCode::OverCapacity,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OverCapacity { .. } | Self::MarketDataUnavailable { .. }
        )
    }

    /// Failed feasibility checks, empty for other errors.
    pub fn violations(&self) -> &[ConstraintViolation] {
        match self {
            Self::InfeasibleConstraints { violations } => violations,
            _ => &[],
        }
    }

    /// Creates an insufficient data error.
    #[must_use]
    pub fn insufficient_data(subject: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            subject: subject.into(),
            required,
            actual,
        }
    }

    /// Creates a degenerate covariance error.
    #[must_use]
    pub fn degenerate_covariance(
        min_eigenvalue: f64,
        shrinkage: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self::DegenerateCovariance {
            min_eigenvalue,
            shrinkage,
            detail: detail.into(),
        }
    }

    /// Creates an optimization failed error.
    #[must_use]
    pub fn optimization_failed(
        method: impl Into<String>,
        status: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::OptimizationFailed {
            method: method.into(),
            status: status.into(),
            detail: detail.into(),
        }
    }

    /// Creates a market data error.
    #[must_use]
    pub fn market_data(reason: impl Into<String>) -> Self {
        Self::MarketDataUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Maps a numerical failure inside `method` to `OPTIMIZATION_FAILED`.
    #[must_use]
    pub fn from_math(method: &str, err: MathError) -> Self {
        let status = match &err {
            MathError::SolverFailed { status, .. } => status.clone(),
            MathError::ConvergenceFailed { .. } => "max_iterations".to_string(),
            MathError::InvalidInput { .. } | MathError::DimensionMismatch { .. } => {
                "invalid_parameter".to_string()
            }
            _ => "numerical_error".to_string(),
        };
        Self::optimization_failed(method, status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            OptimizerError::insufficient_data("AAPL", 2, 1).code().as_str(),
            "INSUFFICIENT_DATA"
        );
        assert_eq!(
            OptimizerError::OverCapacity { queued: 4, limit: 4 }.code(),
            ErrorCode::OverCapacity
        );
        assert_eq!(OptimizerError::Cancelled.code().to_string(), "CANCELLED");
    }

    #[test]
    fn test_retryable() {
        assert!(OptimizerError::OverCapacity { queued: 1, limit: 1 }.is_retryable());
        assert!(OptimizerError::market_data("timeout").is_retryable());
        assert!(!OptimizerError::invalid_request("empty").is_retryable());
    }

    #[test]
    fn test_infeasible_display_lists_all_checks() {
        let err = OptimizerError::InfeasibleConstraints {
            violations: vec![
                ConstraintViolation::new(ConstraintCheck::BudgetLower, "portfolio", "sum(min)=1.8"),
                ConstraintViolation::new(ConstraintCheck::SectorCap, "Tech", "cap 0.1 < 0.2"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("budget_lower[portfolio]"));
        assert!(msg.contains("sector_cap[Tech]"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_from_math_status() {
        let err = OptimizerError::from_math("min_volatility", MathError::solver_failed("max_iterations", 200));
        match err {
            OptimizerError::OptimizationFailed { method, status, .. } => {
                assert_eq!(method, "min_volatility");
                assert_eq!(status, "max_iterations");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_code_serializes_screaming() {
        let json = serde_json::to_string(&ErrorCode::NoPositiveExcessReturn).unwrap();
        assert_eq!(json, "\"NO_POSITIVE_EXCESS_RETURN\"");
    }
}
