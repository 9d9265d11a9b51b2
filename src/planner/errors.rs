//! Planner error types
//!
//! Error codes:
//! - BRIDGE_UNSUPPORTED_AGGREGATE (RESIDUAL)
//! - BRIDGE_INVALID_PLAN (REJECT)
//!
//! An unsupported aggregate is a planning signal: the planner catches it and
//! moves the aggregation to local evaluation. It only reaches callers that
//! use the metric translator directly.

use std::fmt;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recovered by local evaluation
    Residual,
    /// Malformed plan fragment, caller bug
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Residual => write!(f, "RESIDUAL"),
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Planner error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Aggregate has no native remote metric
    UnsupportedAggregate,
    /// Plan fragment references fields or aggregates that do not exist
    InvalidPlan,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::UnsupportedAggregate => "BRIDGE_UNSUPPORTED_AGGREGATE",
            PlannerErrorCode::InvalidPlan => "BRIDGE_INVALID_PLAN",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::UnsupportedAggregate => Severity::Residual,
            PlannerErrorCode::InvalidPlan => Severity::Reject,
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
}

impl PlannerError {
    /// Create an unsupported aggregate error
    pub fn unsupported_aggregate(aggregate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::UnsupportedAggregate,
            message: format!("{}: {}", aggregate.into(), reason.into()),
        }
    }

    /// Create an invalid plan error
    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::InvalidPlan,
            message: reason.into(),
        }
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the planner recovers from this error locally
    pub fn is_planning_signal(&self) -> bool {
        self.code.severity() == Severity::Residual
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PlannerErrorCode::UnsupportedAggregate.code(),
            "BRIDGE_UNSUPPORTED_AGGREGATE"
        );
        assert_eq!(PlannerErrorCode::InvalidPlan.code(), "BRIDGE_INVALID_PLAN");
    }

    #[test]
    fn test_planning_signal() {
        assert!(PlannerError::unsupported_aggregate("sum(DISTINCT x)", "no metric").is_planning_signal());
        assert!(!PlannerError::invalid_plan("field index 9 out of range").is_planning_signal());
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::unsupported_aggregate("avg(DISTINCT fieldc)", "no distinct mean");
        let display = err.to_string();
        assert!(display.starts_with("[RESIDUAL] BRIDGE_UNSUPPORTED_AGGREGATE"));
        assert!(display.contains("avg(DISTINCT fieldc)"));
    }
}
