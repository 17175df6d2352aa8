//! Dispatcher behaviour against in-memory stores and a mock transport

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use common::{members, now, scheduled, Harness};
use mailcast_core::{
    Campaign, CampaignId, CampaignStatus, DeliveryOutcome, DeliveryRecord, EngagementEvent,
    Frequency, Recipient, RecurrenceSpec, RecurringDay, Segment, SegmentId, SuppressionReason,
    Variant, WinnerMetric,
};
use mailcast_runtime::{
    CampaignDispatcher, CampaignStore, DeliveryStore, DispatcherConfig, MemoryCampaignStore,
    MemoryDeliveryStore, MockTransport, Result, RuntimeError,
};
use std::sync::{Arc, Mutex};

/// What happens between a worker reading `due()` and claiming a campaign
enum Interlude {
    /// Another worker runs a whole tick
    RivalTick(CampaignDispatcher),
    /// An admin saves an edited campaign
    Edit(Campaign),
}

/// Campaign store that runs one [`Interlude`] just before the first claim
struct InterleavedStore {
    inner: Arc<MemoryCampaignStore>,
    interlude: Mutex<Option<Interlude>>,
}

impl InterleavedStore {
    fn new(inner: Arc<MemoryCampaignStore>, interlude: Interlude) -> Self {
        Self {
            inner,
            interlude: Mutex::new(Some(interlude)),
        }
    }
}

#[async_trait]
impl CampaignStore for InterleavedStore {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        self.inner.get(id).await
    }

    async fn save(&self, campaign: &Campaign) -> Result<()> {
        self.inner.save(campaign).await
    }

    async fn next_id(&self) -> Result<CampaignId> {
        self.inner.next_id().await
    }

    async fn list(&self) -> Result<Vec<Campaign>> {
        self.inner.list().await
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        self.inner.due(now).await
    }

    async fn claim(
        &self,
        id: CampaignId,
        expected: CampaignStatus,
        occurrence: Option<DateTime<Utc>>,
        next: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        let interlude = self.interlude.lock().unwrap().take();
        match interlude {
            Some(Interlude::RivalTick(rival)) => {
                let tick = rival.process_due(now()).await?;
                assert_eq!(tick.campaigns.len(), 1);
            }
            Some(Interlude::Edit(campaign)) => self.inner.save(&campaign).await?,
            None => {}
        }
        self.inner.claim(id, expected, occurrence, next).await
    }

    async fn get_segment(&self, id: SegmentId) -> Result<Option<Segment>> {
        self.inner.get_segment(id).await
    }

    async fn save_segment(&self, segment: &Segment) -> Result<()> {
        self.inner.save_segment(segment).await
    }

    async fn segments(&self) -> Result<Vec<Segment>> {
        self.inner.segments().await
    }
}

/// Delivery store that accepts pending records but cannot write outcomes
struct UnwritableOutcomes(Arc<MemoryDeliveryStore>);

#[async_trait]
impl DeliveryStore for UnwritableOutcomes {
    async fn insert_records(&self, records: Vec<DeliveryRecord>) -> Result<()> {
        self.0.insert_records(records).await
    }

    async fn update_record(&self, _record: &DeliveryRecord) -> Result<()> {
        Err(RuntimeError::Storage("disk full".to_string()))
    }

    async fn records_for(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryRecord>> {
        self.0.records_for(campaign_id).await
    }

    async fn record_event(&self, event: EngagementEvent) -> Result<()> {
        self.0.record_event(event).await
    }

    async fn events_for(&self, campaign_id: CampaignId) -> Result<Vec<EngagementEvent>> {
        self.0.events_for(campaign_id).await
    }

    async fn all_events(&self) -> Result<Vec<EngagementEvent>> {
        self.0.all_events().await
    }
}

fn daily_at_nine(id: u64) -> Campaign {
    let mut campaign = scheduled(id, now())
        .with_recurrence(RecurrenceSpec::daily(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
    campaign.next_run_at = Some(now());
    campaign
}

#[tokio::test]
async fn test_cork_scenario_sends_to_195() {
    let harness = Harness::new(members(1000));
    for id in [5u64, 10, 15, 20, 25] {
        harness
            .suppression
            .suppress(&format!("member{}@example.ie", id), SuppressionReason::Unsubscribe, now())
            .await
            .unwrap();
    }

    let campaign = scheduled(1, now()).with_counties(["Cork"]);
    harness.add(&campaign).await;
    let dispatcher = harness.dispatcher();

    assert_eq!(dispatcher.preview(&campaign, now()).await.unwrap(), 195);

    let tick = dispatcher.process_due(now()).await.unwrap();
    assert_eq!(tick.due, 1);
    let report = &tick.campaigns[0];
    assert_eq!(report.queued, 195);
    assert_eq!(report.sent, 195);
    assert_eq!(report.suppressed_excluded, 5);
    assert_eq!(report.status, CampaignStatus::Sent);

    let sent = harness.transport.sent().await;
    assert_eq!(sent.len(), 195);
    assert!(sent.iter().all(|m| m.email != "member5@example.ie"));

    let stored = harness.campaign(1).await;
    assert_eq!(stored.status, CampaignStatus::Sent);
    assert_eq!(stored.total_recipients, 195);
    assert_eq!(stored.sent_at, Some(now()));
}

#[tokio::test]
async fn test_concurrent_ticks_dispatch_once() {
    let harness = Harness::new(members(50));
    harness.add(&scheduled(1, now())).await;

    let first = harness.dispatcher();
    let second = harness.dispatcher();
    let (a, b) = tokio::join!(first.process_due(now()), second.process_due(now()));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.campaigns.len() + b.campaigns.len(), 1);
    assert_eq!(harness.transport.sent().await.len(), 50);
    assert_eq!(harness.deliveries.records_for(1).await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_recurring_occurrence_sent_by_rival_is_not_resent() {
    let harness = Harness::new(members(10));
    harness.add(&daily_at_nine(1)).await;

    let store = InterleavedStore::new(
        harness.campaigns.clone(),
        Interlude::RivalTick(harness.dispatcher()),
    );
    let worker = harness.dispatcher_with(Arc::new(store), harness.deliveries.clone());
    let tick = worker.process_due(now()).await.unwrap();

    // The rival sent the occurrence and handed the campaign back as scheduled
    assert_eq!(tick.due, 1);
    assert_eq!(tick.skipped, 1);
    assert!(tick.campaigns.is_empty());
    assert_eq!(harness.transport.sent().await.len(), 10);
    assert_eq!(harness.deliveries.records_for(1).await.unwrap().len(), 10);

    let stored = harness.campaign(1).await;
    assert_eq!(stored.status, CampaignStatus::Scheduled);
    assert_eq!(stored.last_recurring_sent, Some(now()));
    assert_eq!(stored.next_run_at, Some(now() + Duration::days(1)));
}

#[tokio::test]
async fn test_dispatch_sends_the_claimed_copy() {
    let harness = Harness::new(members(3));
    harness.add(&scheduled(1, now())).await;

    let mut edited = scheduled(1, now());
    edited.subject = "June news (updated)".to_string();
    let store = InterleavedStore::new(harness.campaigns.clone(), Interlude::Edit(edited));
    let worker = harness.dispatcher_with(Arc::new(store), harness.deliveries.clone());
    let tick = worker.process_due(now()).await.unwrap();
    assert_eq!(tick.campaigns.len(), 1);

    let sent = harness.transport.sent().await;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m.subject == "June news (updated)"));

    let stored = harness.campaign(1).await;
    assert_eq!(stored.subject, "June news (updated)");
    assert_eq!(stored.status, CampaignStatus::Sent);
}

#[tokio::test]
async fn test_unwritable_outcomes_do_not_abort_dispatch() {
    let harness = Harness::new(members(10));
    harness.add(&daily_at_nine(1)).await;

    let deliveries = Arc::new(UnwritableOutcomes(harness.deliveries.clone()));
    let worker = harness
        .dispatcher_with(harness.campaigns.clone(), deliveries)
        .with_config(DispatcherConfig {
            send_batch_size: 3,
            ..DispatcherConfig::default()
        });

    let tick = worker.process_due(now()).await.unwrap();
    assert!(tick.failures.is_empty());
    let report = &tick.campaigns[0];
    assert_eq!(report.sent, 10);
    assert_eq!(report.unrecorded, 10);
    assert_eq!(report.status, CampaignStatus::Scheduled);
    assert_eq!(report.next_run_at, Some(now() + Duration::days(1)));

    let records = harness.deliveries.records_for(1).await.unwrap();
    assert!(records.iter().all(|r| r.outcome == DeliveryOutcome::Pending));

    // The occurrence is settled, so the next poll sends nothing
    let later = worker.process_due(now() + Duration::hours(1)).await.unwrap();
    assert_eq!(later.due, 0);
    assert_eq!(harness.transport.sent().await.len(), 10);
}

#[tokio::test]
async fn test_unwritable_outcomes_still_mark_one_off_sent() {
    let harness = Harness::new(members(4));
    harness.add(&scheduled(1, now())).await;

    let deliveries = Arc::new(UnwritableOutcomes(harness.deliveries.clone()));
    let worker = harness.dispatcher_with(harness.campaigns.clone(), deliveries);
    let tick = worker.process_due(now()).await.unwrap();

    assert_eq!(tick.campaigns[0].sent, 4);
    assert_eq!(harness.campaign(1).await.status, CampaignStatus::Sent);
    assert_eq!(harness.transport.sent().await.len(), 4);
}

#[tokio::test]
async fn test_transport_failures_do_not_abort_batch() {
    let transport = MockTransport::new().rejecting(["member2@example.ie", "member7@example.ie"]);
    let harness = Harness::with_transport(members(10), transport);
    harness.add(&scheduled(1, now())).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    let report = &tick.campaigns[0];
    assert_eq!(report.sent, 8);
    assert_eq!(report.failed, 2);
    assert_eq!(report.status, CampaignStatus::Sent);

    let records = harness.deliveries.records_for(1).await.unwrap();
    let failed: Vec<_> = records
        .iter()
        .filter(|r| r.outcome == DeliveryOutcome::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed[0].error.as_deref().unwrap_or("").contains("rejected"));
}

#[tokio::test]
async fn test_empty_one_off_fails() {
    let harness = Harness::new(members(10));
    harness
        .add(&scheduled(1, now()).with_counties(["Galway"]))
        .await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    assert_eq!(tick.campaigns[0].status, CampaignStatus::Failed);
    assert_eq!(harness.campaign(1).await.status, CampaignStatus::Failed);
}

#[tokio::test]
async fn test_recurring_occurrence_schedules_next_run() {
    let harness = Harness::new(members(4));
    let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let mut campaign = scheduled(1, now())
        .with_recurrence(RecurrenceSpec::weekly(RecurringDay::Monday, time));
    campaign.scheduled_at = None;
    campaign.next_run_at = Some(now());
    harness.add(&campaign).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    let report = &tick.campaigns[0];
    assert_eq!(report.sent, 4);
    assert_eq!(report.status, CampaignStatus::Scheduled);
    assert_eq!(report.next_run_at, Some(now() + Duration::days(7)));

    let stored = harness.campaign(1).await;
    assert_eq!(stored.last_recurring_sent, Some(now()));
    assert_eq!(stored.recurrence.as_ref().map(|r| r.frequency), Some(Frequency::Weekly));

    // Not due again until next week
    let later = harness.dispatcher().process_due(now() + Duration::hours(1)).await.unwrap();
    assert_eq!(later.due, 0);
}

#[tokio::test]
async fn test_recurring_past_end_date_finishes() {
    let harness = Harness::new(members(2));
    let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let spec = RecurrenceSpec::daily(time).until(now().date_naive());
    let mut campaign = scheduled(1, now()).with_recurrence(spec);
    campaign.next_run_at = Some(now());
    harness.add(&campaign).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    assert_eq!(tick.campaigns[0].status, CampaignStatus::Sent);
    assert_eq!(harness.campaign(1).await.next_run_at, None);
}

#[tokio::test]
async fn test_recurring_with_every_send_failing_is_deferred() {
    let transport = MockTransport::new().rejecting(["member1@example.ie"]);
    let harness = Harness::with_transport(members(1), transport);
    let mut campaign = scheduled(1, now())
        .with_recurrence(RecurrenceSpec::daily(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
    campaign.next_run_at = Some(now());
    harness.add(&campaign).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    assert_eq!(tick.campaigns.len(), 1);
    let stored = harness.campaign(1).await;
    assert_eq!(stored.status, CampaignStatus::Scheduled);
    assert_eq!(stored.next_run_at, Some(now()));
    assert_eq!(stored.last_recurring_sent, None);
}

#[tokio::test]
async fn test_ab_variants_are_counted() {
    let harness = Harness::new(members(200));
    let campaign = scheduled(1, now()).with_ab_test("June offers", 50, WinnerMetric::Opens);
    harness.add(&campaign).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    let report = &tick.campaigns[0];
    let a = report.variants.get(&Variant::A).copied().unwrap_or(0);
    let b = report.variants.get(&Variant::B).copied().unwrap_or(0);
    assert_eq!(a + b, 200);
    assert!(a > 0 && b > 0);

    let sent = harness.transport.sent().await;
    assert!(sent
        .iter()
        .filter(|m| m.variant == Some(Variant::B))
        .all(|m| m.subject == "June offers"));
}

#[tokio::test]
async fn test_send_now_requires_sendable_status() {
    let harness = Harness::new(members(3));
    let mut campaign = scheduled(1, now());
    campaign.status = CampaignStatus::Sent;
    harness.add(&campaign).await;

    let err = harness
        .dispatcher()
        .send_now(&campaign, now())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_send_to_explicit_list_respects_suppression() {
    let harness = Harness::new(members(3));
    harness
        .suppression
        .suppress("b@x.ie", SuppressionReason::Manual, now())
        .await
        .unwrap();
    let campaign = mailcast_core::Campaign::draft(9, "Reminder: June news", "<p>Hello</p>", now());
    harness.add(&campaign).await;

    let report = harness
        .dispatcher()
        .send_to(
            &campaign,
            vec![
                Recipient::new("a@x.ie", None),
                Recipient::new("B@x.ie", None),
                Recipient::new("a@x.ie", None),
            ],
            now(),
        )
        .await
        .unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.suppressed_excluded, 1);
    assert_eq!(harness.campaign(9).await.status, CampaignStatus::Sent);
}

#[tokio::test]
async fn test_future_campaigns_are_not_due() {
    let harness = Harness::new(members(3));
    let later = Utc.with_ymd_and_hms(2025, 6, 3, 9, 0, 0).unwrap();
    harness.add(&scheduled(1, later)).await;

    let tick = harness.dispatcher().process_due(now()).await.unwrap();
    assert_eq!(tick.due, 0);
    assert!(harness.transport.sent().await.is_empty());
}
