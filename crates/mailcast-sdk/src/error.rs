//! SDK error types

use mailcast_core::{CampaignId, CoreError};
use mailcast_repository::RepositoryError;
use mailcast_runtime::RuntimeError;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid campaign, segment or recurrence
    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] RuntimeError),

    /// Repository error
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// The requested action is not allowed in the campaign's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SdkError {
    /// Invalid recurrence or schedule; the campaign stays a draft
    pub fn is_scheduling_fault(&self) -> bool {
        matches!(
            self,
            SdkError::Validation(CoreError::Scheduling(_))
                | SdkError::RuntimeError(RuntimeError::Core(CoreError::Scheduling(_)))
        )
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = SdkError::ConfigError("A transport is required".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("transport"));
    }

    #[test]
    fn test_scheduling_fault_detection() {
        let error: SdkError = CoreError::Scheduling("monthly recurrence requires a day of the month".into()).into();
        assert!(error.is_scheduling_fault());
        assert!(error.to_string().contains("day of the month"));

        let runtime: SdkError = RuntimeError::Core(CoreError::Scheduling("x".into())).into();
        assert!(runtime.is_scheduling_fault());
        assert!(!SdkError::CampaignNotFound(3).is_scheduling_fault());
    }

    #[test]
    fn test_runtime_error_conversion() {
        let error: SdkError = RuntimeError::CampaignNotFound(9).into();
        assert!(error.to_string().contains("Runtime error"));
        assert!(error.to_string().contains('9'));
    }
}
