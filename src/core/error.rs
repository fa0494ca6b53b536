//! Error taxonomy for the simulation core.
//!
//! Configuration errors abort a whole run. Numeric failures are scoped to a
//! single allocation and surface as [`AllocationFailure`](super::AllocationFailure)
//! records instead.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error("invalid distribution for {context}: {reason}")]
    InvalidDistribution { context: String, reason: String },

    #[error("empty configuration: {0}")]
    EmptyConfiguration(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("random draw {draw} is outside [0, 1) and matches no bucket")]
    SamplingExhaustion { draw: f64 },

    #[error("non-finite income in allocation {allocation} at iteration {iteration}")]
    NumericOverflow { allocation: usize, iteration: u32 },
}

impl SimError {
    pub fn invalid_distribution(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Configuration errors abort the run; everything else is per-allocation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidDistribution { .. } | Self::EmptyConfiguration(_) | Self::InvalidParameter(_)
        )
    }
}

pub type SimResult<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_distinguished_from_run_failures() {
        assert!(SimError::invalid_distribution("OAT price", "no entries").is_configuration());
        assert!(SimError::EmptyConfiguration("no fields".to_string()).is_configuration());
        assert!(SimError::InvalidParameter("cap".to_string()).is_configuration());
        assert!(!SimError::SamplingExhaustion { draw: 1.0 }.is_configuration());
        assert!(
            !SimError::NumericOverflow {
                allocation: 3,
                iteration: 7
            }
            .is_configuration()
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = SimError::invalid_distribution("CORN yield per hectare", "probabilities sum to 0.9");
        assert_eq!(
            err.to_string(),
            "invalid distribution for CORN yield per hectare: probabilities sum to 0.9"
        );
    }
}
