//! Mailcast Core - Core types and definitions for the Mailcast campaign engine
//!
//! This crate provides the fundamental types used across the Mailcast ecosystem:
//! - Member, subscriber and recipient snapshots
//! - Segment rules (typed fields, operators and condition values)
//! - Campaigns and recurrence specs
//! - Delivery, bounce and engagement records
//! - Suppression entries
//! - Error types

pub mod campaign;
pub mod delivery;
pub mod error;
pub mod member;
pub mod segment;
pub mod suppression;

// Re-export commonly used types
pub use campaign::{
    Campaign, CampaignId, CampaignStatus, DayOfMonth, Frequency, RecurrenceSpec, RecurringDay,
    TargetAudience, WinnerMetric,
};
pub use delivery::{
    BounceEvent, BounceType, DeliveryOutcome, DeliveryRecord, EngagementEvent, EngagementKind,
    Variant,
};
pub use error::{CoreError, Result};
pub use member::{
    is_valid_email, normalize_email, ActivityTier, AudienceSnapshot, EmailEngagement,
    EngagementTier, GeoPoint, GroupId, Member, MemberId, RankBand, Recipient, Subscriber,
};
pub use segment::{
    default_segments, Condition, ConditionOperator, ConditionValue, FieldSpec, FieldType,
    GeoRadius, MatchType, NumberRange, Segment, SegmentField, SegmentId, SegmentRules,
};
pub use suppression::{SuppressionEntry, SuppressionReason};
