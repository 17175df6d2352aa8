//! NewsletterEngine - the campaign facade
//!
//! Every operation that depends on the clock takes `now` explicitly; the
//! engine never reads the system time itself.

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use chrono::{DateTime, Utc};
use mailcast_core::{
    BounceEvent, Campaign, CampaignId, CampaignStatus, CoreError, EngagementEvent, FieldSpec,
    Recipient, Segment, SegmentField, SuppressionEntry, SuppressionReason, Variant,
};
use mailcast_runtime::engagement::{
    engagement_by_hour, engagement_by_weekday, optimal_send_times, DailyEngagement,
    HourlyEngagement,
};
use mailcast_runtime::{
    BounceOutcome, CampaignDispatcher, CampaignReport, CampaignStore, DeliveryStore,
    DispatchReport, EngagementAggregator, OptimalSendTimes, ScheduleCalculator,
    SuppressionRegistry, SuppressionStats, TickReport,
};
use serde::Serialize;
use std::sync::Arc;

/// Number of recent bounce events included in suppression stats
const RECENT_BOUNCE_EVENTS: usize = 20;

/// Whether a sent campaign can be resent to the members who did not open it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResendInfo {
    pub can_resend: bool,
    pub days_since_sent: i64,
    pub wait_days: i64,
    pub days_remaining: i64,
    pub non_opener_count: usize,
    pub total_sent: usize,
    /// Share of delivered recipients that did not open, one decimal place
    pub non_opener_percent: f64,
}

/// Result of a resend to non-openers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResendOutcome {
    pub campaign: Campaign,
    pub report: DispatchReport,
}

/// Campaign engine
pub struct NewsletterEngine {
    config: EngineConfig,
    campaigns: Arc<dyn CampaignStore>,
    deliveries: Arc<dyn DeliveryStore>,
    suppression: Arc<SuppressionRegistry>,
    dispatcher: CampaignDispatcher,
    aggregator: EngagementAggregator,
}

impl NewsletterEngine {
    pub(crate) fn new(
        config: EngineConfig,
        campaigns: Arc<dyn CampaignStore>,
        deliveries: Arc<dyn DeliveryStore>,
        suppression: Arc<SuppressionRegistry>,
        dispatcher: CampaignDispatcher,
    ) -> Self {
        Self {
            config,
            campaigns,
            deliveries,
            suppression,
            dispatcher,
            aggregator: EngagementAggregator::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn suppression(&self) -> &SuppressionRegistry {
        &self.suppression
    }

    // ---- Campaigns and segments ----

    pub async fn campaign(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .get(id)
            .await?
            .ok_or(SdkError::CampaignNotFound(id))
    }

    pub async fn campaigns(&self) -> Result<Vec<Campaign>> {
        Ok(self.campaigns.list().await?)
    }

    /// Allocate an id for a new campaign
    pub async fn next_campaign_id(&self) -> Result<CampaignId> {
        Ok(self.campaigns.next_id().await?)
    }

    /// Save a draft; sent or sending campaigns cannot be edited
    ///
    /// Only the subject is checked here. Recurrence and A/B settings are
    /// validated when the campaign is scheduled or sent.
    pub async fn save_draft(&self, campaign: Campaign) -> Result<Campaign> {
        if let Some(existing) = self.campaigns.get(campaign.id).await? {
            existing.ensure_editable()?;
        }
        if campaign.status != CampaignStatus::Draft {
            return Err(SdkError::InvalidOperation(format!(
                "Campaign {} must be saved as a draft, not {}",
                campaign.id, campaign.status
            )));
        }
        if campaign.subject.trim().is_empty() {
            return Err(CoreError::InvalidCampaign("Subject is required".to_string()).into());
        }
        self.campaigns.save(&campaign).await?;
        Ok(campaign)
    }

    pub async fn save_segment(&self, segment: Segment) -> Result<Segment> {
        if segment.name.trim().is_empty() {
            return Err(CoreError::InvalidSegment("Segment name is required".to_string()).into());
        }
        self.campaigns.save_segment(&segment).await?;
        Ok(segment)
    }

    pub async fn segments(&self) -> Result<Vec<Segment>> {
        Ok(self.campaigns.segments().await?)
    }

    /// Fields, operators and options for the rule builder
    pub fn field_catalogue(&self) -> Vec<FieldSpec> {
        SegmentField::catalogue()
    }

    // ---- Sending and scheduling ----

    /// Recipients a send would reach right now, after suppression
    pub async fn preview(&self, id: CampaignId, now: DateTime<Utc>) -> Result<usize> {
        let campaign = self.campaign(id).await?;
        Ok(self.dispatcher.preview(&campaign, now).await?)
    }

    pub async fn send_now(&self, id: CampaignId, now: DateTime<Utc>) -> Result<DispatchReport> {
        let campaign = self.campaign(id).await?;
        Ok(self.dispatcher.send_now(&campaign, now).await?)
    }

    /// Schedule a campaign
    ///
    /// One-off campaigns need `at`. Recurring campaigns compute their first
    /// run from their recurrence; an invalid recurrence leaves the campaign
    /// as it was.
    pub async fn schedule(
        &self,
        id: CampaignId,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut campaign = self.campaign(id).await?;
        campaign.ensure_editable()?;
        campaign.validate()?;

        match campaign.recurrence.clone() {
            Some(spec) => {
                let next = ScheduleCalculator::next_run(&spec, now, campaign.last_recurring_sent)
                    .ok_or_else(|| {
                        CoreError::Scheduling(
                            "Recurrence has no occurrence after now".to_string(),
                        )
                    })?;
                campaign.next_run_at = Some(next);
                campaign.scheduled_at = None;
            }
            None => {
                let at = at.ok_or_else(|| {
                    CoreError::Scheduling("A send time is required".to_string())
                })?;
                campaign.scheduled_at = Some(at);
                campaign.next_run_at = None;
            }
        }

        campaign.transition(CampaignStatus::Scheduled)?;
        self.campaigns.save(&campaign).await?;
        tracing::info!(
            campaign_id = campaign.id,
            scheduled_at = ?campaign.scheduled_at,
            next_run_at = ?campaign.next_run_at,
            "Campaign scheduled"
        );
        Ok(campaign)
    }

    /// Return a scheduled or failed campaign to draft
    pub async fn unschedule(&self, id: CampaignId) -> Result<Campaign> {
        let mut campaign = self.campaign(id).await?;
        campaign.transition(CampaignStatus::Draft)?;
        campaign.scheduled_at = None;
        campaign.next_run_at = None;
        self.campaigns.save(&campaign).await?;
        Ok(campaign)
    }

    /// Dispatch every campaign due at `now`
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<TickReport> {
        Ok(self.dispatcher.process_due(now).await?)
    }

    // ---- Bounces and suppression ----

    pub async fn record_bounce(&self, event: BounceEvent) -> Result<BounceOutcome> {
        Ok(self.suppression.record_bounce(event).await?)
    }

    pub async fn record_engagement(&self, event: EngagementEvent) -> Result<()> {
        self.campaign(event.campaign_id).await?;
        Ok(self.deliveries.record_event(event).await?)
    }

    pub async fn suppress(
        &self,
        email: &str,
        reason: SuppressionReason,
        now: DateTime<Utc>,
    ) -> Result<SuppressionEntry> {
        Ok(self.suppression.suppress(email, reason, now).await?)
    }

    /// Lift a suppression; returns false when the address was not suppressed
    pub async fn unsuppress(&self, email: &str) -> Result<bool> {
        Ok(self.suppression.restore(email).await?)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.suppression.purge_expired(now).await?)
    }

    pub async fn suppression_stats(&self, now: DateTime<Utc>) -> Result<SuppressionStats> {
        Ok(self.suppression.stats(now, RECENT_BOUNCE_EVENTS).await?)
    }

    pub async fn bounce_history(&self, email: &str) -> Result<Vec<BounceEvent>> {
        Ok(self.suppression.history(email).await?)
    }

    // ---- Analytics ----

    pub async fn analytics(&self, id: CampaignId) -> Result<CampaignReport> {
        let campaign = self.campaign(id).await?;
        let records = self.deliveries.records_for(id).await?;
        let events = self.deliveries.events_for(id).await?;
        Ok(self.aggregator.report(&campaign, &records, &events))
    }

    /// Best hours to send, across every campaign's events
    pub async fn optimal_send_times(&self, top: usize) -> Result<OptimalSendTimes> {
        let events = self.deliveries.all_events().await?;
        Ok(optimal_send_times(&events, top))
    }

    pub async fn engagement_by_hour(&self) -> Result<Vec<HourlyEngagement>> {
        let events = self.deliveries.all_events().await?;
        Ok(engagement_by_hour(&events))
    }

    pub async fn engagement_by_weekday(&self) -> Result<Vec<DailyEngagement>> {
        let events = self.deliveries.all_events().await?;
        Ok(engagement_by_weekday(&events))
    }

    pub async fn non_openers(&self, id: CampaignId) -> Result<Vec<Recipient>> {
        self.campaign(id).await?;
        let records = self.deliveries.records_for(id).await?;
        let events = self.deliveries.events_for(id).await?;
        Ok(self.aggregator.non_openers(&records, &events))
    }

    pub async fn openers_without_click(&self, id: CampaignId) -> Result<Vec<String>> {
        self.campaign(id).await?;
        let events = self.deliveries.events_for(id).await?;
        Ok(self.aggregator.openers_without_click(&events))
    }

    /// Record the winning variant of a sent A/B campaign
    pub async fn select_ab_winner(&self, id: CampaignId, winner: Variant) -> Result<Campaign> {
        let mut campaign = self.campaign(id).await?;
        if !campaign.is_ab_test() {
            return Err(SdkError::InvalidOperation(format!(
                "Campaign {} is not an A/B test",
                id
            )));
        }
        if campaign.status != CampaignStatus::Sent {
            return Err(SdkError::InvalidOperation(format!(
                "A winner can only be selected once campaign {} is sent",
                id
            )));
        }
        campaign.ab_winner = Some(winner);
        self.campaigns.save(&campaign).await?;
        tracing::info!(campaign_id = id, winner = %winner.as_str(), "A/B winner selected");
        Ok(campaign)
    }

    // ---- Resend to non-openers ----

    /// Resend eligibility; `None` unless the campaign has been sent
    pub async fn resend_info(
        &self,
        id: CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Option<ResendInfo>> {
        let campaign = self.campaign(id).await?;
        let Some(sent_at) = sent_at(&campaign) else {
            return Ok(None);
        };

        let records = self.deliveries.records_for(id).await?;
        let events = self.deliveries.events_for(id).await?;
        let metrics = self.aggregator.metrics(&records, &events);
        let non_opener_count = self.aggregator.non_openers(&records, &events).len();

        let wait_days = self.config.resend_wait_days;
        let days_since_sent = (now - sent_at).num_days();
        let delivered = self.aggregator.delivered_recipients(&records);
        let non_opener_percent = if delivered == 0 {
            0.0
        } else {
            (non_opener_count as f64 / delivered as f64 * 1000.0).round() / 10.0
        };

        Ok(Some(ResendInfo {
            can_resend: days_since_sent >= wait_days && non_opener_count > 0,
            days_since_sent,
            wait_days,
            days_remaining: (wait_days - days_since_sent).max(0),
            non_opener_count,
            total_sent: metrics.sent,
            non_opener_percent,
        }))
    }

    /// Create a follow-up campaign and send it to everyone who did not open
    /// the original
    pub async fn resend_to_non_openers(
        &self,
        id: CampaignId,
        subject: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ResendOutcome> {
        let original = self.campaign(id).await?;
        let sent_at = sent_at(&original).ok_or_else(|| {
            SdkError::InvalidOperation("Only sent campaigns can be resent".to_string())
        })?;

        let wait_days = self.config.resend_wait_days;
        let days_since_sent = (now - sent_at).num_days();
        if days_since_sent < wait_days {
            return Err(SdkError::InvalidOperation(format!(
                "Please wait at least {} days before resending. Only {} day(s) have passed.",
                wait_days, days_since_sent
            )));
        }

        let recipients = self.non_openers(id).await?;
        if recipients.is_empty() {
            return Err(SdkError::InvalidOperation(
                "No non-openers found for this newsletter".to_string(),
            ));
        }

        let subject = subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{}{}", self.config.resend_subject_prefix, original.subject));
        let new_id = self.campaigns.next_id().await?;
        let copy = original.resend_copy(new_id, subject, now);
        self.campaigns.save(&copy).await?;

        tracing::info!(
            campaign_id = id,
            resend_id = new_id,
            recipients = recipients.len(),
            "Resending to non-openers"
        );
        let report = self.dispatcher.send_to(&copy, recipients, now).await?;
        let campaign = self.campaign(new_id).await?;
        Ok(ResendOutcome { campaign, report })
    }
}

fn sent_at(campaign: &Campaign) -> Option<DateTime<Utc>> {
    match campaign.status {
        CampaignStatus::Sent => campaign.sent_at,
        _ => None,
    }
}
