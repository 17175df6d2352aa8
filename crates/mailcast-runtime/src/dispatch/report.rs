//! Dispatch and tick reports

use chrono::{DateTime, Utc};
use mailcast_core::{CampaignId, CampaignStatus, Variant};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What happened to one campaign in one dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub campaign_id: CampaignId,
    pub queued: usize,
    pub sent: usize,
    pub failed: usize,
    /// Sends whose outcome could not be written back to the delivery store
    pub unrecorded: usize,
    /// Targeted addresses dropped because they are suppressed
    pub suppressed_excluded: usize,
    /// Queued recipients per A/B variant
    pub variants: BTreeMap<Variant, usize>,
    /// Status the campaign was left in
    pub status: CampaignStatus,
    /// Next occurrence of a recurring campaign
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl DispatchReport {
    pub(crate) fn new(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id,
            queued: 0,
            sent: 0,
            failed: 0,
            unrecorded: 0,
            suppressed_excluded: 0,
            variants: BTreeMap::new(),
            status: CampaignStatus::Sending,
            next_run_at: None,
        }
    }
}

/// A campaign that could not be dispatched this tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub campaign_id: CampaignId,
    pub message: String,
}

/// Summary of one scheduler poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub due: usize,
    /// Campaigns another worker claimed first
    pub skipped: usize,
    pub campaigns: Vec<DispatchReport>,
    pub failures: Vec<DispatchFailure>,
}

impl TickReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            due: 0,
            skipped: 0,
            campaigns: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn total_queued(&self) -> usize {
        self.campaigns.iter().map(|c| c.queued).sum()
    }

    pub fn total_sent(&self) -> usize {
        self.campaigns.iter().map(|c| c.sent).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.campaigns.iter().map(|c| c.failed).sum()
    }
}
