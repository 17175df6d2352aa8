//! Mailcast Runtime - audience resolution and delivery scheduling
//!
//! This crate turns campaigns, segments and a member snapshot into
//! deliveries: rule evaluation, segment and audience resolution, the
//! suppression registry, A/B assignment, recurring schedules, the
//! dispatcher and engagement aggregation.

pub mod audience;
pub mod dispatch;
pub mod engagement;
pub mod error;
pub mod evaluator;
pub mod provider;
pub mod schedule;
pub mod segment;
pub mod store;
pub mod suppression;
pub mod transport;
pub mod variant;

// Re-export main types
pub use audience::{Audience, AudienceResolver};
pub use dispatch::{
    CampaignDispatcher, DispatchFailure, DispatchReport, DispatcherConfig, TickReport,
};
pub use engagement::{
    AbComparison, AbVerdict, CampaignMetrics, CampaignReport, EngagementAggregator, HourBucket,
    LinkStats, OptimalSendTimes,
};
pub use error::{Result, RuntimeError};
pub use evaluator::{activity_tier, DataQualityFault, EvaluationContext, RuleEvaluator};
pub use provider::{MemberSnapshotProvider, StaticSnapshotProvider};
pub use schedule::ScheduleCalculator;
pub use segment::SegmentResolver;
pub use store::{
    occurrence_of, CampaignStore, DeliveryStore, MemoryCampaignStore, MemoryDeliveryStore,
};
pub use suppression::{
    BounceOutcome, FileBackend, MemoryBackend, SuppressionBackend, SuppressionRegistry,
    SuppressionSnapshot, SuppressionStats,
};
pub use transport::{DeliveryFault, MockTransport, OutboundMessage, Transport};
pub use variant::VariantAssigner;
