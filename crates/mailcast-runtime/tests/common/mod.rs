//! Shared fixture for dispatcher tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use mailcast_core::{AudienceSnapshot, Campaign, CampaignStatus, Member};
use mailcast_runtime::{
    CampaignDispatcher, CampaignStore, DeliveryStore, MemoryCampaignStore, MemoryDeliveryStore,
    MockTransport, StaticSnapshotProvider, SuppressionRegistry,
};
use std::sync::Arc;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

/// `count` members; every fifth lives in Cork, the rest in Kerry
pub fn members(count: u64) -> Vec<Member> {
    (1..=count)
        .map(|id| {
            let county = if id % 5 == 0 { "Cork" } else { "Kerry" };
            Member::new(id, format!("member{}@example.ie", id), now() - chrono::Duration::days(100))
                .with_county(county)
        })
        .collect()
}

pub fn scheduled(id: u64, at: DateTime<Utc>) -> Campaign {
    let mut campaign = Campaign::draft(id, "June news", "<p>Hello</p>", now());
    campaign.status = CampaignStatus::Scheduled;
    campaign.scheduled_at = Some(at);
    campaign
}

pub struct Harness {
    pub campaigns: Arc<MemoryCampaignStore>,
    pub deliveries: Arc<MemoryDeliveryStore>,
    pub suppression: Arc<SuppressionRegistry>,
    pub transport: Arc<MockTransport>,
    pub provider: Arc<StaticSnapshotProvider>,
}

impl Harness {
    pub fn new(members: Vec<Member>) -> Self {
        Self::with_transport(members, MockTransport::new())
    }

    pub fn with_transport(members: Vec<Member>, transport: MockTransport) -> Self {
        Self {
            campaigns: Arc::new(MemoryCampaignStore::new()),
            deliveries: Arc::new(MemoryDeliveryStore::new()),
            suppression: Arc::new(SuppressionRegistry::in_memory()),
            transport: Arc::new(transport),
            provider: Arc::new(StaticSnapshotProvider::new(AudienceSnapshot::new(
                now(),
                members,
            ))),
        }
    }

    pub fn dispatcher(&self) -> CampaignDispatcher {
        self.dispatcher_with(self.campaigns.clone(), self.deliveries.clone())
    }

    /// Dispatcher over other stores, sharing this harness's members,
    /// suppression list and transport
    pub fn dispatcher_with(
        &self,
        campaigns: Arc<dyn CampaignStore>,
        deliveries: Arc<dyn DeliveryStore>,
    ) -> CampaignDispatcher {
        CampaignDispatcher::new(
            campaigns,
            deliveries,
            self.provider.clone(),
            self.suppression.clone(),
            self.transport.clone(),
        )
    }

    pub async fn add(&self, campaign: &Campaign) {
        self.campaigns.save(campaign).await.unwrap();
    }

    pub async fn campaign(&self, id: u64) -> Campaign {
        self.campaigns.get(id).await.unwrap().unwrap()
    }
}
