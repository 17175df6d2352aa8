//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use mailcast_core::{AudienceSnapshot, Campaign, Member};
use mailcast_runtime::{MockTransport, StaticSnapshotProvider};
use mailcast_sdk::{EngineConfig, NewsletterEngine, NewsletterEngineBuilder};
use std::sync::Arc;

/// Monday 2 June 2025, 09:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub fn days_later(days: i64) -> DateTime<Utc> {
    now() + Duration::days(days)
}

pub fn email(id: u64) -> String {
    format!("member{}@example.ie", id)
}

/// `count` members; every fifth lives in Cork, the rest in Kerry
pub fn members(count: u64) -> Vec<Member> {
    (1..=count)
        .map(|id| {
            let county = if id % 5 == 0 { "Cork" } else { "Kerry" };
            Member::new(id, email(id), now() - Duration::days(200)).with_county(county)
        })
        .collect()
}

/// Engine over in-memory stores with a recording transport
pub struct TestEngine {
    pub engine: NewsletterEngine,
    pub transport: Arc<MockTransport>,
    pub provider: Arc<StaticSnapshotProvider>,
}

impl TestEngine {
    pub async fn new(members: Vec<Member>) -> Self {
        Self::with_config(members, EngineConfig::new()).await
    }

    pub async fn with_config(members: Vec<Member>, config: EngineConfig) -> Self {
        let transport = Arc::new(MockTransport::new());
        let provider = Arc::new(StaticSnapshotProvider::new(AudienceSnapshot::new(
            now(),
            members,
        )));
        let engine = NewsletterEngineBuilder::new()
            .with_config(config)
            .with_member_provider(provider.clone())
            .with_transport(transport.clone())
            .build()
            .await
            .expect("engine should build");
        Self {
            engine,
            transport,
            provider,
        }
    }

    /// Save a new draft and return its id
    pub async fn draft(&self, subject: &str) -> u64 {
        let id = self.engine.next_campaign_id().await.unwrap();
        self.engine
            .save_draft(Campaign::draft(id, subject, "<p>Hello</p>", now()))
            .await
            .unwrap();
        id
    }

    pub async fn save(&self, campaign: Campaign) -> u64 {
        let id = campaign.id;
        self.engine.save_draft(campaign).await.unwrap();
        id
    }
}
