//! Runtime error types

use mailcast_core::{CampaignId, CoreError, SegmentId};
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A suppressed address reached the send stage. Fatal to the batch.
    #[error("Suppression conflict: campaign {campaign_id} would send to suppressed address {email}")]
    SuppressionConflict {
        campaign_id: CampaignId,
        email: String,
    },

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),

    /// Validation error from the data model
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure in a store or backend
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
