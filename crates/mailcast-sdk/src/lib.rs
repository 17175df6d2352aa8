//! Mailcast SDK
//!
//! High-level API for building and running the newsletter engine.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;

// Re-export main types
pub use builder::NewsletterEngineBuilder;
pub use config::EngineConfig;
pub use engine::{NewsletterEngine, ResendInfo, ResendOutcome};
pub use error::{Result, SdkError};

// Re-export commonly used types from dependencies
pub use mailcast_core::{
    BounceEvent, BounceType, Campaign, CampaignId, CampaignStatus, EngagementEvent, Member,
    RecurrenceSpec, Segment, SegmentRules, SuppressionReason, Variant, WinnerMetric,
};
pub use mailcast_runtime::{
    CampaignReport, DispatchReport, MemberSnapshotProvider, OptimalSendTimes, TickReport,
    Transport,
};
