//! Campaign dispatch
//!
//! One dispatch of one campaign runs:
//!
//! 1. claim: atomic `scheduled|draft -> sending` on the occurrence that was
//!    read; losing the race skips and the stored copy is what gets sent
//! 2. resolve the audience against one member snapshot and one suppression
//!    snapshot
//! 3. re-check every recipient against that suppression snapshot; a hit is
//!    a [`RuntimeError::SuppressionConflict`] and aborts the whole tick
//! 4. assign A/B variants, write pending delivery records
//! 5. fan out to the transport with bounded concurrency; a failed recipient
//!    or a failed outcome write is logged and the batch continues
//! 6. settle the campaign status (and the next run of a recurring campaign)

mod report;

pub use report::{DispatchFailure, DispatchReport, TickReport};

use crate::audience::{Audience, AudienceResolver};
use crate::error::{Result, RuntimeError};
use crate::evaluator::RuleEvaluator;
use crate::provider::MemberSnapshotProvider;
use crate::schedule::ScheduleCalculator;
use crate::segment::{SegmentResolver, DEFAULT_PARALLEL_THRESHOLD};
use crate::store::{occurrence_of, CampaignStore, DeliveryStore};
use crate::suppression::{SuppressionRegistry, SuppressionSnapshot};
use crate::transport::{OutboundMessage, Transport};
use crate::variant::VariantAssigner;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use mailcast_core::{Campaign, CampaignStatus, DeliveryOutcome, DeliveryRecord, Recipient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 8;
pub const DEFAULT_SEND_BATCH_SIZE: usize = 50;

/// Dispatcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Sends in flight at once
    pub max_concurrent_sends: usize,
    /// Records handed to the transport per batch
    pub send_batch_size: usize,
    /// Threads used for segment evaluation (1 disables threading)
    pub evaluation_parallelism: usize,
    /// Member count below which segment evaluation stays on one thread
    pub parallel_threshold: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            send_batch_size: DEFAULT_SEND_BATCH_SIZE,
            evaluation_parallelism: 1,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

enum Target {
    Resolve,
    Explicit(Vec<Recipient>),
}

/// Sends campaigns
pub struct CampaignDispatcher {
    campaigns: Arc<dyn CampaignStore>,
    deliveries: Arc<dyn DeliveryStore>,
    members: Arc<dyn MemberSnapshotProvider>,
    suppression: Arc<SuppressionRegistry>,
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
}

impl CampaignDispatcher {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        deliveries: Arc<dyn DeliveryStore>,
        members: Arc<dyn MemberSnapshotProvider>,
        suppression: Arc<SuppressionRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            campaigns,
            deliveries,
            members,
            suppression,
            transport,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Resolver whose rule evaluation runs as of `now`
    pub fn audience_resolver(&self, now: DateTime<Utc>) -> AudienceResolver {
        AudienceResolver::new(
            SegmentResolver::new(RuleEvaluator::at(now))
                .with_parallelism(self.config.evaluation_parallelism)
                .with_parallel_threshold(self.config.parallel_threshold),
        )
    }

    /// Resolve a campaign's audience without sending anything
    pub async fn resolve_audience(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<Audience> {
        let suppression = self.suppression.snapshot(now).await;
        self.resolve_with(campaign, &suppression, now).await
    }

    /// Recipient count a send at `now` would reach
    pub async fn preview(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.resolve_audience(campaign, now).await?.len())
    }

    /// Dispatch every campaign due at `now`.
    ///
    /// A campaign that fails is recorded in the report and the tick moves
    /// on; a suppression conflict aborts the tick and is returned.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut tick = TickReport::new(now);
        let due = self.campaigns.due(now).await?;
        tick.due = due.len();
        info!(run_id = %tick.run_id, due = tick.due, "Processing due campaigns");

        for campaign in due {
            let campaign_id = campaign.id;
            match self
                .run(&campaign, CampaignStatus::Scheduled, Target::Resolve, now)
                .await
            {
                Ok(Some(report)) => tick.campaigns.push(report),
                Ok(None) => tick.skipped += 1,
                Err(err @ RuntimeError::SuppressionConflict { .. }) => {
                    error!(run_id = %tick.run_id, campaign_id, "Aborting tick: {}", err);
                    return Err(err);
                }
                Err(err) => {
                    error!(run_id = %tick.run_id, campaign_id, error = %err, "Campaign dispatch failed");
                    tick.failures.push(DispatchFailure {
                        campaign_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %tick.run_id,
            dispatched = tick.campaigns.len(),
            skipped = tick.skipped,
            failed_campaigns = tick.failures.len(),
            sent = tick.total_sent(),
            failed = tick.total_failed(),
            "Tick complete"
        );
        Ok(tick)
    }

    /// Send a draft or scheduled campaign immediately
    pub async fn send_now(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<DispatchReport> {
        self.claim_and_run(campaign, Target::Resolve, now).await
    }

    /// Send a draft campaign to an explicit recipient list. Suppression
    /// still applies.
    pub async fn send_to(
        &self,
        campaign: &Campaign,
        recipients: Vec<Recipient>,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        self.claim_and_run(campaign, Target::Explicit(recipients), now)
            .await
    }

    async fn claim_and_run(
        &self,
        campaign: &Campaign,
        target: Target,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        let expected = campaign.status;
        if !matches!(expected, CampaignStatus::Draft | CampaignStatus::Scheduled) {
            return Err(RuntimeError::InvalidOperation(format!(
                "Campaign {} cannot be sent while {}",
                campaign.id, expected
            )));
        }
        campaign.validate()?;

        self.run(campaign, expected, target, now)
            .await?
            .ok_or_else(|| {
                RuntimeError::InvalidOperation(format!(
                    "Campaign {} is already being sent",
                    campaign.id
                ))
            })
    }

    /// Claim the occurrence `seen` is due on and dispatch the claimed copy.
    ///
    /// Returns `Ok(None)` when the campaign was claimed elsewhere or has
    /// moved on to another occurrence since `seen` was read.
    async fn run(
        &self,
        seen: &Campaign,
        expected: CampaignStatus,
        target: Target,
        now: DateTime<Utc>,
    ) -> Result<Option<DispatchReport>> {
        let claimed = self
            .campaigns
            .claim(seen.id, expected, occurrence_of(seen), CampaignStatus::Sending)
            .await?;
        let Some(mut campaign) = claimed else {
            debug!(campaign_id = seen.id, "Campaign claimed elsewhere, skipping");
            return Ok(None);
        };
        info!(campaign_id = campaign.id, subject = %campaign.subject, "Dispatching campaign");

        match self.deliver(&mut campaign, target, now).await {
            Ok(report) => Ok(Some(report)),
            Err(err) => {
                let fatal = matches!(err, RuntimeError::SuppressionConflict { .. });
                self.abandon(&mut campaign, fatal).await;
                Err(err)
            }
        }
    }

    async fn deliver(
        &self,
        campaign: &mut Campaign,
        target: Target,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        let mut report = DispatchReport::new(campaign.id);
        let suppression = self.suppression.snapshot(now).await;

        let audience = match target {
            Target::Resolve => self.resolve_with(campaign, &suppression, now).await?,
            Target::Explicit(recipients) => self
                .audience_resolver(now)
                .restrict(recipients, &suppression),
        };
        report.suppressed_excluded = audience.suppressed_excluded;

        if audience.is_empty() {
            warn!(campaign_id = campaign.id, "No eligible recipients");
            self.settle(campaign, &mut report, now).await?;
            return Ok(report);
        }

        if let Some(recipient) = audience
            .recipients
            .iter()
            .find(|r| suppression.is_suppressed(&r.email))
        {
            error!(
                campaign_id = campaign.id,
                email = %recipient.email,
                "Suppressed address reached the send stage"
            );
            return Err(RuntimeError::SuppressionConflict {
                campaign_id: campaign.id,
                email: recipient.email.clone(),
            });
        }

        let assigner = campaign
            .is_ab_test()
            .then(|| VariantAssigner::new(campaign.id, campaign.ab_split_percentage));
        let records: Vec<DeliveryRecord> = audience
            .recipients
            .iter()
            .map(|recipient| {
                let variant = assigner.as_ref().map(|a| a.variant_for(&recipient.email));
                DeliveryRecord::pending(campaign.id, recipient, variant, now)
            })
            .collect();

        for variant in records.iter().filter_map(|r| r.variant) {
            *report.variants.entry(variant).or_default() += 1;
        }
        report.queued = records.len();
        self.deliveries.insert_records(records.clone()).await?;

        self.send_all(campaign, records, &mut report, now).await?;

        self.settle(campaign, &mut report, now).await?;
        Ok(report)
    }

    async fn resolve_with(
        &self,
        campaign: &Campaign,
        suppression: &SuppressionSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Audience> {
        let snapshot = self.members.snapshot(now).await?;
        let segment = match campaign.segment_id {
            Some(id) => self.campaigns.get_segment(id).await?,
            None => None,
        };
        self.audience_resolver(now)
            .resolve(campaign, &snapshot, segment.as_ref(), suppression)
    }

    async fn send_all(
        &self,
        campaign: &Campaign,
        records: Vec<DeliveryRecord>,
        report: &mut DispatchReport,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let semaphore = Semaphore::new(self.config.max_concurrent_sends.max(1));
        let semaphore = &semaphore;

        for batch in records.chunks(self.config.send_batch_size.max(1)) {
            let sends = batch.iter().cloned().map(|record| async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| RuntimeError::InvalidOperation(e.to_string()))?;
                Ok::<_, RuntimeError>(self.send_one(campaign, record, now).await)
            });

            for result in join_all(sends).await {
                let (record, recorded) = result?;
                match record.outcome {
                    DeliveryOutcome::Sent => report.sent += 1,
                    _ => report.failed += 1,
                }
                if !recorded {
                    report.unrecorded += 1;
                }
            }
            debug!(
                campaign_id = campaign.id,
                sent = report.sent,
                failed = report.failed,
                "Batch delivered"
            );
        }

        Ok(())
    }

    /// Send one record and write its outcome back.
    ///
    /// The outcome stands even when the write fails: the transport has
    /// already accepted or refused the message. The flag is false then.
    async fn send_one(
        &self,
        campaign: &Campaign,
        mut record: DeliveryRecord,
        now: DateTime<Utc>,
    ) -> (DeliveryRecord, bool) {
        let message = OutboundMessage {
            campaign_id: campaign.id,
            subject: campaign.subject_for(record.variant).to_string(),
            content: campaign.content.clone(),
            email: record.email.clone(),
            member_id: record.member_id,
            variant: record.variant,
        };

        match self.transport.send(&message).await {
            Ok(()) => record.mark_sent(now),
            Err(fault) => {
                warn!(
                    campaign_id = campaign.id,
                    email = %record.email,
                    transport = self.transport.name(),
                    error = %fault,
                    "Delivery failed"
                );
                record.mark_failed(fault.to_string());
            }
        }

        let recorded = match self.deliveries.update_record(&record).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    campaign_id = campaign.id,
                    email = %record.email,
                    outcome = ?record.outcome,
                    error = %err,
                    "Cannot persist delivery outcome"
                );
                false
            }
        };
        (record, recorded)
    }

    /// Final status after a dispatch that ran to completion
    async fn settle(
        &self,
        campaign: &mut Campaign,
        report: &mut DispatchReport,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let total = u32::try_from(report.queued).unwrap_or(u32::MAX);

        if let Some(spec) = campaign.recurrence.clone() {
            if report.queued > 0 && report.sent == 0 {
                // Every send failed: keep next_run_at and retry on the next poll
                warn!(campaign_id = campaign.id, "All sends failed, deferring occurrence");
                campaign.transition(CampaignStatus::Scheduled)?;
            } else {
                if report.sent > 0 {
                    campaign.last_recurring_sent = Some(now);
                    campaign.sent_at = Some(now);
                    campaign.total_recipients = total;
                }
                campaign.next_run_at =
                    ScheduleCalculator::next_run(&spec, now, campaign.last_recurring_sent);
                match campaign.next_run_at {
                    Some(_) => campaign.transition(CampaignStatus::Scheduled)?,
                    None => campaign.transition(CampaignStatus::Sent)?,
                }
            }
        } else if report.sent == 0 {
            campaign.transition(CampaignStatus::Failed)?;
        } else {
            campaign.sent_at = Some(now);
            campaign.total_recipients = total;
            campaign.transition(CampaignStatus::Sent)?;
        }

        report.status = campaign.status;
        report.next_run_at = campaign.next_run_at.filter(|_| campaign.is_recurring());
        self.campaigns.save(campaign).await?;

        info!(
            campaign_id = campaign.id,
            status = %campaign.status,
            queued = report.queued,
            sent = report.sent,
            failed = report.failed,
            unrecorded = report.unrecorded,
            suppressed_excluded = report.suppressed_excluded,
            "Campaign dispatched"
        );
        Ok(())
    }

    /// Release a claimed campaign after an error
    async fn abandon(&self, campaign: &mut Campaign, fatal: bool) {
        let next = if fatal || !campaign.is_recurring() {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Scheduled
        };
        if let Err(err) = campaign.transition(next) {
            error!(campaign_id = campaign.id, error = %err, "Cannot release campaign");
            return;
        }
        if let Err(err) = self.campaigns.save(campaign).await {
            error!(campaign_id = campaign.id, error = %err, "Cannot persist campaign status");
        }
    }
}
