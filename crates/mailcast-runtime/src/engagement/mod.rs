//! Engagement aggregation (read path)
//!
//! Folds delivery records and open/click events for one campaign into rate
//! metrics, an A/B comparison and a few time-series views. Every rate is a
//! percentage and is `0.0` whenever its denominator is zero.

mod send_time;

pub use send_time::{
    engagement_by_hour, engagement_by_weekday, optimal_send_times, time_label, DailyEngagement,
    HourlyEngagement, OptimalSendTimes, SendTimeRecommendation, MIN_OPENS_FOR_RECOMMENDATIONS,
};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use mailcast_core::{
    Campaign, DeliveryOutcome, DeliveryRecord, EngagementEvent, EngagementKind, Recipient,
    Variant, WinnerMetric,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Number of links reported by [`EngagementAggregator::top_links`] in a report
pub const TOP_LINKS_LIMIT: usize = 10;

/// Rate metrics for a campaign (or one of its variants)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignMetrics {
    pub sent: usize,
    pub failed: usize,
    pub pending: usize,
    pub total_opens: usize,
    pub unique_opens: usize,
    pub total_clicks: usize,
    pub unique_clicks: usize,
    /// sent / (sent + failed)
    pub success_rate: f64,
    /// unique_opens / sent
    pub open_rate: f64,
    /// unique_clicks / sent
    pub click_rate: f64,
    /// unique_clicks / unique_opens
    pub click_to_open_rate: f64,
}

impl CampaignMetrics {
    fn rate_for(&self, metric: WinnerMetric) -> f64 {
        match metric {
            WinnerMetric::Opens => self.open_rate,
            WinnerMetric::Clicks => self.click_rate,
        }
    }
}

/// Outcome of comparing the two variants on the winner metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AbVerdict {
    Winner {
        variant: Variant,
        /// Absolute difference in percentage points
        margin: f64,
    },
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbComparison {
    pub metric: WinnerMetric,
    pub variant_a: CampaignMetrics,
    pub variant_b: CampaignMetrics,
    /// `None` once an administrator has recorded the winner
    pub suggested: Option<AbVerdict>,
    pub selected_winner: Option<Variant>,
}

/// Opens that happened within one clock hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub hour: DateTime<Utc>,
    pub opens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub url: String,
    pub clicks: usize,
    pub unique_clickers: usize,
}

/// Everything the campaign analytics view shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignReport {
    pub metrics: CampaignMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ab_comparison: Option<AbComparison>,
    pub opens_over_time: Vec<HourBucket>,
    pub top_links: Vec<LinkStats>,
}

/// Stateless aggregation over one campaign's records and events
///
/// Events are trusted to belong to the campaign the records describe;
/// addresses are compared case-folded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementAggregator;

impl EngagementAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Metrics over every delivery record of a campaign. A recurring
    /// campaign contributes one record per recipient per occurrence.
    pub fn metrics(&self, records: &[DeliveryRecord], events: &[EngagementEvent]) -> CampaignMetrics {
        compute(records.iter(), events, |_| true)
    }

    /// Distinct addresses with at least one sent record
    pub fn delivered_recipients(&self, records: &[DeliveryRecord]) -> usize {
        records
            .iter()
            .filter(|r| r.outcome == DeliveryOutcome::Sent)
            .map(|r| r.email.to_lowercase())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Per-variant metrics and the suggested winner
    ///
    /// Returns `None` when the campaign is not an A/B test.
    pub fn compare_variants(
        &self,
        campaign: &Campaign,
        records: &[DeliveryRecord],
        events: &[EngagementEvent],
    ) -> Option<AbComparison> {
        if !campaign.is_ab_test() {
            return None;
        }

        let variant_of: HashMap<String, Variant> = records
            .iter()
            .filter_map(|r| r.variant.map(|v| (r.email.to_lowercase(), v)))
            .collect();

        let for_variant = |variant: Variant| {
            compute(
                records.iter().filter(|r| r.variant == Some(variant)),
                events,
                |email| variant_of.get(email) == Some(&variant),
            )
        };

        let variant_a = for_variant(Variant::A);
        let variant_b = for_variant(Variant::B);
        let metric = campaign.ab_winner_metric;

        let suggested = match campaign.ab_winner {
            Some(_) => None,
            None => Some(verdict(
                variant_a.rate_for(metric),
                variant_b.rate_for(metric),
            )),
        };

        Some(AbComparison {
            metric,
            variant_a,
            variant_b,
            suggested,
            selected_winner: campaign.ab_winner,
        })
    }

    /// Opens per clock hour, oldest first
    pub fn opens_by_hour(&self, events: &[EngagementEvent]) -> Vec<HourBucket> {
        let mut buckets: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
        for event in events.iter().filter(|e| e.kind == EngagementKind::Open) {
            let hour = event
                .occurred_at
                .duration_trunc(TimeDelta::hours(1))
                .unwrap_or(event.occurred_at);
            *buckets.entry(hour).or_default() += 1;
        }
        buckets
            .into_iter()
            .map(|(hour, opens)| HourBucket { hour, opens })
            .collect()
    }

    /// Most clicked links, by total clicks then URL
    pub fn top_links(&self, events: &[EngagementEvent], limit: usize) -> Vec<LinkStats> {
        let mut links: HashMap<&str, (usize, HashSet<String>)> = HashMap::new();
        for event in events.iter().filter(|e| e.kind == EngagementKind::Click) {
            let Some(url) = event.url.as_deref() else {
                continue;
            };
            let entry = links.entry(url).or_default();
            entry.0 += 1;
            entry.1.insert(event.email.to_lowercase());
        }

        let mut stats: Vec<LinkStats> = links
            .into_iter()
            .map(|(url, (clicks, clickers))| LinkStats {
                url: url.to_string(),
                clicks,
                unique_clickers: clickers.len(),
            })
            .collect();
        stats.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.url.cmp(&b.url)));
        stats.truncate(limit);
        stats
    }

    /// Recipients whose message was sent and who never opened it, in
    /// delivery record order
    pub fn non_openers(&self, records: &[DeliveryRecord], events: &[EngagementEvent]) -> Vec<Recipient> {
        let opened = emails_with(events, EngagementKind::Open);
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| r.outcome == DeliveryOutcome::Sent)
            .filter(|r| !opened.contains(&r.email.to_lowercase()))
            .filter(|r| seen.insert(r.email.to_lowercase()))
            .map(|r| Recipient::new(&r.email, r.member_id))
            .collect()
    }

    /// Addresses that opened but never clicked, sorted
    pub fn openers_without_click(&self, events: &[EngagementEvent]) -> Vec<String> {
        let opened = emails_with(events, EngagementKind::Open);
        let clicked = emails_with(events, EngagementKind::Click);
        opened.difference(&clicked).cloned().collect()
    }

    pub fn report(
        &self,
        campaign: &Campaign,
        records: &[DeliveryRecord],
        events: &[EngagementEvent],
    ) -> CampaignReport {
        CampaignReport {
            metrics: self.metrics(records, events),
            ab_comparison: self.compare_variants(campaign, records, events),
            opens_over_time: self.opens_by_hour(events),
            top_links: self.top_links(events, TOP_LINKS_LIMIT),
        }
    }
}

fn compute<'a>(
    records: impl Iterator<Item = &'a DeliveryRecord>,
    events: &[EngagementEvent],
    include: impl Fn(&str) -> bool,
) -> CampaignMetrics {
    let mut metrics = CampaignMetrics::default();
    for record in records {
        match record.outcome {
            DeliveryOutcome::Sent => metrics.sent += 1,
            DeliveryOutcome::Failed => metrics.failed += 1,
            DeliveryOutcome::Pending => metrics.pending += 1,
        }
    }

    let mut openers = HashSet::new();
    let mut clickers = HashSet::new();
    for event in events {
        let email = event.email.to_lowercase();
        if !include(&email) {
            continue;
        }
        match event.kind {
            EngagementKind::Open => {
                metrics.total_opens += 1;
                openers.insert(email);
            }
            EngagementKind::Click => {
                metrics.total_clicks += 1;
                clickers.insert(email);
            }
        }
    }

    metrics.unique_opens = openers.len();
    metrics.unique_clicks = clickers.len();
    metrics.success_rate = percentage(metrics.sent, metrics.sent + metrics.failed);
    metrics.open_rate = percentage(metrics.unique_opens, metrics.sent);
    metrics.click_rate = percentage(metrics.unique_clicks, metrics.sent);
    metrics.click_to_open_rate = percentage(metrics.unique_clicks, metrics.unique_opens);
    metrics
}

fn verdict(rate_a: f64, rate_b: f64) -> AbVerdict {
    let margin = (rate_a - rate_b).abs();
    if margin < f64::EPSILON {
        AbVerdict::Tie
    } else if rate_a > rate_b {
        AbVerdict::Winner {
            variant: Variant::A,
            margin,
        }
    } else {
        AbVerdict::Winner {
            variant: Variant::B,
            margin,
        }
    }
}

fn emails_with(events: &[EngagementEvent], kind: EngagementKind) -> BTreeSet<String> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.email.to_lowercase())
        .collect()
}

/// `part / whole` as a percentage, `0.0` when `whole` is zero
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, minute, 0).unwrap()
    }

    fn record(email: &str, variant: Option<Variant>, outcome: DeliveryOutcome) -> DeliveryRecord {
        let mut record = DeliveryRecord::pending(7, &Recipient::new(email, None), variant, at(8, 0));
        match outcome {
            DeliveryOutcome::Sent => record.mark_sent(at(8, 1)),
            DeliveryOutcome::Failed => record.mark_failed("rejected"),
            DeliveryOutcome::Pending => {}
        }
        record
    }

    fn ab_campaign() -> Campaign {
        Campaign::draft(7, "Spring", "<p>hi</p>", at(7, 0)).with_ab_test(
            "Spring sale",
            50,
            WinnerMetric::Opens,
        )
    }

    #[test]
    fn test_rates() {
        let records = vec![
            record("a@x.ie", None, DeliveryOutcome::Sent),
            record("b@x.ie", None, DeliveryOutcome::Sent),
            record("c@x.ie", None, DeliveryOutcome::Sent),
            record("d@x.ie", None, DeliveryOutcome::Sent),
            record("e@x.ie", None, DeliveryOutcome::Failed),
        ];
        let events = vec![
            EngagementEvent::open(7, "a@x.ie", at(9, 0)),
            EngagementEvent::open(7, "A@x.ie", at(9, 30)),
            EngagementEvent::open(7, "b@x.ie", at(10, 0)),
            EngagementEvent::click(7, "a@x.ie", "https://x.ie/1", at(9, 1)),
        ];

        let metrics = EngagementAggregator::new().metrics(&records, &events);
        assert_eq!(metrics.sent, 4);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.total_opens, 3);
        assert_eq!(metrics.unique_opens, 2);
        assert_eq!(metrics.success_rate, 80.0);
        assert_eq!(metrics.open_rate, 50.0);
        assert_eq!(metrics.click_rate, 25.0);
        assert_eq!(metrics.click_to_open_rate, 50.0);
    }

    #[test]
    fn test_rates_count_every_occurrence_of_a_recurring_campaign() {
        // Three occurrences to the same ten addresses, one failure in each
        let mut records = Vec::new();
        for occurrence in 0..3 {
            for n in 0..10 {
                let outcome = if n == occurrence {
                    DeliveryOutcome::Failed
                } else {
                    DeliveryOutcome::Sent
                };
                records.push(record(&format!("m{}@x.ie", n), None, outcome));
            }
        }
        let events = vec![
            EngagementEvent::open(7, "m5@x.ie", at(9, 0)),
            EngagementEvent::open(7, "m6@x.ie", at(9, 0)),
            EngagementEvent::open(7, "m7@x.ie", at(9, 0)),
        ];

        let aggregator = EngagementAggregator::new();
        let metrics = aggregator.metrics(&records, &events);
        assert_eq!(metrics.sent, 27);
        assert_eq!(metrics.failed, 3);
        assert_eq!(metrics.success_rate, 90.0);
        assert_eq!(metrics.open_rate, 3.0 * 100.0 / 27.0);
        assert_eq!(aggregator.delivered_recipients(&records), 10);
    }

    #[test]
    fn test_click_to_open_is_zero_without_opens() {
        let records = vec![record("a@x.ie", None, DeliveryOutcome::Sent)];
        let metrics = EngagementAggregator::new().metrics(&records, &[]);
        assert_eq!(metrics.click_to_open_rate, 0.0);
        assert_eq!(metrics.open_rate, 0.0);

        let empty = EngagementAggregator::new().metrics(&[], &[]);
        assert_eq!(empty.success_rate, 0.0);
    }

    #[test]
    fn test_variant_winner_and_margin() {
        let records = vec![
            record("a1@x.ie", Some(Variant::A), DeliveryOutcome::Sent),
            record("a2@x.ie", Some(Variant::A), DeliveryOutcome::Sent),
            record("b1@x.ie", Some(Variant::B), DeliveryOutcome::Sent),
            record("b2@x.ie", Some(Variant::B), DeliveryOutcome::Sent),
        ];
        let events = vec![
            EngagementEvent::open(7, "a1@x.ie", at(9, 0)),
            EngagementEvent::open(7, "b1@x.ie", at(9, 0)),
            EngagementEvent::open(7, "b2@x.ie", at(9, 0)),
        ];

        let comparison = EngagementAggregator::new()
            .compare_variants(&ab_campaign(), &records, &events)
            .unwrap();
        assert_eq!(comparison.variant_a.open_rate, 50.0);
        assert_eq!(comparison.variant_b.open_rate, 100.0);
        assert_eq!(
            comparison.suggested,
            Some(AbVerdict::Winner {
                variant: Variant::B,
                margin: 50.0
            })
        );
    }

    #[test]
    fn test_equal_rates_are_a_tie() {
        let records = vec![
            record("a1@x.ie", Some(Variant::A), DeliveryOutcome::Sent),
            record("b1@x.ie", Some(Variant::B), DeliveryOutcome::Sent),
        ];
        let comparison = EngagementAggregator::new()
            .compare_variants(&ab_campaign(), &records, &[])
            .unwrap();
        assert_eq!(comparison.suggested, Some(AbVerdict::Tie));
    }

    #[test]
    fn test_recorded_winner_stops_suggestion() {
        let mut campaign = ab_campaign();
        campaign.ab_winner = Some(Variant::A);
        let comparison = EngagementAggregator::new()
            .compare_variants(&campaign, &[], &[])
            .unwrap();
        assert_eq!(comparison.suggested, None);
        assert_eq!(comparison.selected_winner, Some(Variant::A));

        let plain = Campaign::draft(8, "Plain", "x", at(7, 0));
        assert!(EngagementAggregator::new()
            .compare_variants(&plain, &[], &[])
            .is_none());
    }

    #[test]
    fn test_opens_by_hour_truncates() {
        let events = vec![
            EngagementEvent::open(7, "a@x.ie", at(9, 59)),
            EngagementEvent::open(7, "b@x.ie", at(9, 1)),
            EngagementEvent::open(7, "c@x.ie", at(11, 0)),
            EngagementEvent::click(7, "c@x.ie", "https://x.ie", at(11, 2)),
        ];
        let buckets = EngagementAggregator::new().opens_by_hour(&events);
        assert_eq!(
            buckets,
            vec![
                HourBucket { hour: at(9, 0), opens: 2 },
                HourBucket { hour: at(11, 0), opens: 1 },
            ]
        );
    }

    #[test]
    fn test_top_links() {
        let events = vec![
            EngagementEvent::click(7, "a@x.ie", "https://x.ie/b", at(9, 0)),
            EngagementEvent::click(7, "a@x.ie", "https://x.ie/b", at(9, 1)),
            EngagementEvent::click(7, "b@x.ie", "https://x.ie/b", at(9, 2)),
            EngagementEvent::click(7, "b@x.ie", "https://x.ie/a", at(9, 3)),
        ];
        let links = EngagementAggregator::new().top_links(&events, 10);
        assert_eq!(links[0].url, "https://x.ie/b");
        assert_eq!(links[0].clicks, 3);
        assert_eq!(links[0].unique_clickers, 2);
        assert_eq!(links[1].url, "https://x.ie/a");
    }

    #[test]
    fn test_non_openers_and_openers_without_click() {
        let records = vec![
            record("a@x.ie", None, DeliveryOutcome::Sent),
            record("b@x.ie", None, DeliveryOutcome::Sent),
            record("c@x.ie", None, DeliveryOutcome::Failed),
        ];
        let events = vec![EngagementEvent::open(7, "a@x.ie", at(9, 0))];
        let aggregator = EngagementAggregator::new();

        let non_openers = aggregator.non_openers(&records, &events);
        assert_eq!(non_openers.len(), 1);
        assert_eq!(non_openers[0].email, "b@x.ie");
        assert_eq!(aggregator.openers_without_click(&events), vec!["a@x.ie".to_string()]);
    }
}
