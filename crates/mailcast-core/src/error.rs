//! Error types for Mailcast Core

use crate::campaign::CampaignStatus;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A single condition failed validation
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// A condition inside a segment rule set failed validation (1-based position)
    #[error("Condition #{position}: {message}")]
    InvalidRule { position: usize, message: String },

    /// Segment-level validation error
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    /// Invalid recurrence or schedule; the campaign cannot leave draft
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Campaign content or targeting is invalid
    #[error("Invalid campaign: {0}")]
    InvalidCampaign(String),

    /// Malformed email address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Status change not permitted by the campaign lifecycle
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// Campaign content/targeting is frozen
    #[error("Campaign {0} can no longer be edited")]
    Immutable(u64),
}

pub type Result<T> = std::result::Result<T, CoreError>;
