//! Suppression registry
//!
//! The single source of truth for addresses that must never be mailed.
//! Audience resolution reads it through a [`SuppressionSnapshot`], an
//! immutable copy taken once per resolution pass.

pub mod backend;
mod registry;

pub use backend::{FileBackend, MemoryBackend, SuppressionBackend};
pub use registry::{
    BounceOutcome, SuppressionRegistry, SuppressionSnapshot, SuppressionStats,
    DEFAULT_SOFT_BOUNCE_THRESHOLD,
};
