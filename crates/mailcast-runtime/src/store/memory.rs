//! In-memory stores backed by `DashMap`

use super::{is_due, occurrence_of, CampaignStore, DeliveryStore};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mailcast_core::{
    Campaign, CampaignId, CampaignStatus, DeliveryRecord, EngagementEvent, Segment, SegmentId,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Campaigns and segments held in memory
#[derive(Debug)]
pub struct MemoryCampaignStore {
    campaigns: DashMap<CampaignId, Campaign>,
    segments: DashMap<SegmentId, Segment>,
    next_id: AtomicU64,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
            segments: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed the store; ids allocated later continue after the highest one
    pub fn with_campaigns(self, campaigns: impl IntoIterator<Item = Campaign>) -> Self {
        for campaign in campaigns {
            self.next_id.fetch_max(campaign.id + 1, Ordering::SeqCst);
            self.campaigns.insert(campaign.id, campaign);
        }
        self
    }

    pub fn with_segments(self, segments: impl IntoIterator<Item = Segment>) -> Self {
        for segment in segments {
            self.segments.insert(segment.id, segment);
        }
        self
    }
}

impl Default for MemoryCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, campaign: &Campaign) -> Result<()> {
        self.next_id.fetch_max(campaign.id + 1, Ordering::SeqCst);
        self.campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn next_id(&self) -> Result<CampaignId> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn list(&self) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|entry| entry.value().clone()).collect();
        campaigns.sort_by_key(|c| c.id);
        Ok(campaigns)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let mut due: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|entry| is_due(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|c| c.id);
        Ok(due)
    }

    async fn claim(
        &self,
        id: CampaignId,
        expected: CampaignStatus,
        occurrence: Option<DateTime<Utc>>,
        next: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        // The shard write lock is held for the whole check-and-update
        let Some(mut entry) = self.campaigns.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != expected || occurrence_of(&entry) != occurrence {
            return Ok(None);
        }
        entry.transition(next)?;
        Ok(Some(entry.value().clone()))
    }

    async fn get_segment(&self, id: SegmentId) -> Result<Option<Segment>> {
        Ok(self.segments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save_segment(&self, segment: &Segment) -> Result<()> {
        self.segments.insert(segment.id, segment.clone());
        Ok(())
    }

    async fn segments(&self) -> Result<Vec<Segment>> {
        let mut segments: Vec<Segment> =
            self.segments.iter().map(|entry| entry.value().clone()).collect();
        segments.sort_by_key(|s| s.id);
        Ok(segments)
    }
}

/// Delivery records and engagement events held in memory
#[derive(Debug, Default)]
pub struct MemoryDeliveryStore {
    records: DashMap<CampaignId, Vec<DeliveryRecord>>,
    events: DashMap<CampaignId, Vec<EngagementEvent>>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn insert_records(&self, records: Vec<DeliveryRecord>) -> Result<()> {
        for record in records {
            self.records.entry(record.campaign_id).or_default().push(record);
        }
        Ok(())
    }

    async fn update_record(&self, record: &DeliveryRecord) -> Result<()> {
        let mut entry = self.records.get_mut(&record.campaign_id).ok_or_else(|| {
            RuntimeError::Storage(format!(
                "no delivery records for campaign {}",
                record.campaign_id
            ))
        })?;
        let stored = entry
            .iter_mut()
            .find(|r| r.email == record.email && r.queued_at == record.queued_at)
            .ok_or_else(|| {
                RuntimeError::Storage(format!(
                    "no delivery record for {} in campaign {}",
                    record.email, record.campaign_id
                ))
            })?;
        *stored = record.clone();
        Ok(())
    }

    async fn records_for(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryRecord>> {
        Ok(self
            .records
            .get(&campaign_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn record_event(&self, event: EngagementEvent) -> Result<()> {
        self.events.entry(event.campaign_id).or_default().push(event);
        Ok(())
    }

    async fn events_for(&self, campaign_id: CampaignId) -> Result<Vec<EngagementEvent>> {
        Ok(self
            .events
            .get(&campaign_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn all_events(&self) -> Result<Vec<EngagementEvent>> {
        let mut events: Vec<EngagementEvent> = self
            .events
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }
}
