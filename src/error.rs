//! Error types shared by every appraisal entry point

use thiserror::Error;

/// Errors raised by the appraisal engine
#[derive(Debug, Error)]
pub enum AppraisalError {
    /// A required quantity is zero, negative, non-finite or out of range.
    /// Caller-recoverable: surface the message and let the user correct the input.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Newton-Raphson failed to converge or its derivative vanished
    #[error("IRR did not converge after {iterations} iterations: {reason}")]
    NonConvergence { iterations: u32, reason: String },

    /// A simulation was cancelled between chunks
    #[error("Simulation cancelled")]
    Cancelled,

    #[error("Scenario {0} not found")]
    ScenarioNotFound(u64),

    /// The scenario store could not be reached (poisoned lock, failed write)
    #[error("Scenario store unavailable: {0}")]
    StoreUnavailable(String),

    /// A background simulation thread could not be started or panicked
    #[error("Simulation worker failed: {0}")]
    WorkerFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppraisalError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AppraisalError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the caller can fix this by correcting its inputs
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, AppraisalError::InvalidParameter { .. })
    }

    pub fn is_non_convergence(&self) -> bool {
        matches!(self, AppraisalError::NonConvergence { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppraisalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = AppraisalError::invalid("selling_price", "must be positive");
        assert!(err.is_invalid_parameter());
        assert!(err.to_string().contains("selling_price"));
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_non_convergence_display() {
        let err = AppraisalError::NonConvergence {
            iterations: 100,
            reason: "tolerance not met".to_string(),
        };
        assert!(err.is_non_convergence());
        assert!(!err.is_invalid_parameter());
        assert!(err.to_string().contains("100 iterations"));
    }
}
