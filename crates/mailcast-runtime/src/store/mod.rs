//! Persistence boundaries for campaigns, segments and delivery data
//!
//! The dispatcher only talks to these traits. [`memory`] provides the
//! in-process implementations used by the scheduler and the tests.

mod memory;

pub use memory::{MemoryCampaignStore, MemoryDeliveryStore};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailcast_core::{
    Campaign, CampaignId, CampaignStatus, DeliveryRecord, EngagementEvent, Segment, SegmentId,
};

/// Campaign and segment storage
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>>;

    /// Insert or replace a campaign
    async fn save(&self, campaign: &Campaign) -> Result<()>;

    /// Allocate an id for a new campaign
    async fn next_id(&self) -> Result<CampaignId>;

    /// All campaigns, ordered by id
    async fn list(&self) -> Result<Vec<Campaign>>;

    /// Scheduled campaigns whose next occurrence is at or before `now`,
    /// ordered by id.
    ///
    /// One-off campaigns are due on `scheduled_at`, recurring ones on
    /// `next_run_at`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Atomically claim one occurrence of `id`, moving it from `expected`
    /// to `next`.
    ///
    /// The claim only succeeds while the stored status is still `expected`
    /// and its due timestamp (see [`occurrence_of`]) is still `occurrence`.
    /// A recurring campaign that another worker already sent and handed
    /// back to `scheduled` has moved on to a later occurrence and is not
    /// claimed again. Returns the stored campaign after the transition, or
    /// `None` when the caller lost the race and must not dispatch.
    async fn claim(
        &self,
        id: CampaignId,
        expected: CampaignStatus,
        occurrence: Option<DateTime<Utc>>,
        next: CampaignStatus,
    ) -> Result<Option<Campaign>>;

    async fn get_segment(&self, id: SegmentId) -> Result<Option<Segment>>;

    async fn save_segment(&self, segment: &Segment) -> Result<()>;

    /// All segments, ordered by id
    async fn segments(&self) -> Result<Vec<Segment>>;
}

/// Delivery records and engagement events
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn insert_records(&self, records: Vec<DeliveryRecord>) -> Result<()>;

    /// Replace the stored record with the same campaign, email and
    /// `queued_at`
    async fn update_record(&self, record: &DeliveryRecord) -> Result<()>;

    /// Records for one campaign in insertion order
    async fn records_for(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryRecord>>;

    async fn record_event(&self, event: EngagementEvent) -> Result<()>;

    async fn events_for(&self, campaign_id: CampaignId) -> Result<Vec<EngagementEvent>>;

    /// Every engagement event across campaigns
    async fn all_events(&self) -> Result<Vec<EngagementEvent>>;
}

pub(crate) fn is_due(campaign: &Campaign, now: DateTime<Utc>) -> bool {
    if campaign.status != CampaignStatus::Scheduled {
        return false;
    }
    occurrence_of(campaign).is_some_and(|at| at <= now)
}

/// The timestamp a campaign is due on: `next_run_at` for recurring
/// campaigns, `scheduled_at` otherwise
pub fn occurrence_of(campaign: &Campaign) -> Option<DateTime<Utc>> {
    if campaign.is_recurring() {
        campaign.next_run_at
    } else {
        campaign.scheduled_at
    }
}
