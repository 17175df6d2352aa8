//! Campaigns
//!
//! A campaign is editable while it is a draft, scheduled or failed. Once it
//! moves to `sending` its content and targeting are frozen; a follow-up
//! ("resend to non-openers") is a new campaign built with
//! [`Campaign::resend_copy`].

pub mod recurrence;

pub use recurrence::{hh_mm, DayOfMonth, Frequency, RecurrenceSpec, RecurringDay};

use crate::delivery::Variant;
use crate::error::{CoreError, Result};
use crate::member::GroupId;
use crate::segment::SegmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Campaign identifier
pub type CampaignId = u64;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }

    /// Lifecycle edges. `sending -> scheduled` is the recurring hand-back
    /// once an occurrence completes.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Sending)
                | (Scheduled, Draft)
                | (Scheduled, Scheduled)
                | (Scheduled, Sending)
                | (Sending, Sent)
                | (Sending, Failed)
                | (Sending, Scheduled)
                | (Failed, Draft)
                | (Failed, Scheduled)
        )
    }

    /// Content and targeting may still change
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Draft | CampaignStatus::Scheduled | CampaignStatus::Failed
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse pool a campaign starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    #[default]
    AllMembers,
    SubscribersOnly,
    Both,
}

/// Metric used to suggest an A/B winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinnerMetric {
    #[default]
    Opens,
    Clicks,
}

fn default_split() -> u8 {
    50
}

/// A newsletter campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub subject: String,
    /// Variant B subject line for A/B tests
    #[serde(default)]
    pub subject_b: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: CampaignStatus,

    // Targeting
    #[serde(default)]
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub segment_id: Option<SegmentId>,
    #[serde(default)]
    pub target_counties: Vec<String>,
    #[serde(default)]
    pub target_towns: Vec<String>,
    #[serde(default)]
    pub target_groups: Vec<GroupId>,

    // A/B testing
    #[serde(default)]
    pub ab_test_enabled: bool,
    /// Percentage of recipients routed to variant A
    #[serde(default = "default_split")]
    pub ab_split_percentage: u8,
    #[serde(default)]
    pub ab_winner_metric: WinnerMetric,
    /// Winner recorded by an administrator
    #[serde(default)]
    pub ab_winner: Option<Variant>,

    // Scheduling
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceSpec>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
    /// Last recurring occurrence that delivered to at least one recipient
    #[serde(default)]
    pub last_recurring_sent: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_recipients: u32,
    /// Campaign this one was resent from
    #[serde(default)]
    pub parent_id: Option<CampaignId>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// New draft targeting all members
    pub fn draft(
        id: CampaignId,
        subject: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            subject_b: None,
            content: content.into(),
            status: CampaignStatus::Draft,
            target_audience: TargetAudience::AllMembers,
            segment_id: None,
            target_counties: Vec::new(),
            target_towns: Vec::new(),
            target_groups: Vec::new(),
            ab_test_enabled: false,
            ab_split_percentage: default_split(),
            ab_winner_metric: WinnerMetric::Opens,
            ab_winner: None,
            scheduled_at: None,
            recurrence: None,
            next_run_at: None,
            last_recurring_sent: None,
            sent_at: None,
            total_recipients: 0,
            parent_id: None,
            created_at,
        }
    }

    pub fn with_audience(mut self, audience: TargetAudience) -> Self {
        self.target_audience = audience;
        self
    }

    pub fn with_segment(mut self, segment_id: SegmentId) -> Self {
        self.segment_id = Some(segment_id);
        self
    }

    pub fn with_counties<I, S>(mut self, counties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_counties = counties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_towns<I, S>(mut self, towns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_towns = towns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.target_groups = groups.into_iter().collect();
        self
    }

    /// Enable an A/B subject test
    pub fn with_ab_test(
        mut self,
        subject_b: impl Into<String>,
        split_percentage: u8,
        metric: WinnerMetric,
    ) -> Self {
        self.ab_test_enabled = true;
        self.subject_b = Some(subject_b.into());
        self.ab_split_percentage = split_percentage;
        self.ab_winner_metric = metric;
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceSpec) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// A/B test that actually has a second subject line
    pub fn is_ab_test(&self) -> bool {
        self.ab_test_enabled
            && self
                .subject_b
                .as_deref()
                .is_some_and(|subject| !subject.trim().is_empty())
    }

    /// Subject line sent to a variant
    pub fn subject_for(&self, variant: Option<Variant>) -> &str {
        match (variant, self.subject_b.as_deref()) {
            (Some(Variant::B), Some(subject_b)) if self.is_ab_test() => subject_b,
            _ => &self.subject,
        }
    }

    pub fn has_targeting_filters(&self) -> bool {
        self.segment_id.is_some()
            || !self.target_counties.is_empty()
            || !self.target_towns.is_empty()
            || !self.target_groups.is_empty()
    }

    /// Check the campaign can be sent or scheduled
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(CoreError::InvalidCampaign("Subject is required".to_string()));
        }
        if self.ab_split_percentage > 100 {
            return Err(CoreError::InvalidCampaign(format!(
                "A/B split must be between 0 and 100, got {}",
                self.ab_split_percentage
            )));
        }
        if self.ab_test_enabled && !self.is_ab_test() {
            return Err(CoreError::InvalidCampaign(
                "A/B test requires a subject line for variant B".to_string(),
            ));
        }
        if let Some(recurrence) = &self.recurrence {
            recurrence.validate()?;
        }
        Ok(())
    }

    pub fn ensure_editable(&self) -> Result<()> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(CoreError::Immutable(self.id))
        }
    }

    /// Move to `next`, rejecting edges the lifecycle does not allow
    pub fn transition(&mut self, next: CampaignStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Follow-up draft carrying the same content under a new subject
    pub fn resend_copy(
        &self,
        id: CampaignId,
        subject: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Campaign {
        let mut copy = Campaign::draft(id, subject, self.content.clone(), created_at);
        copy.target_audience = self.target_audience;
        copy.parent_id = Some(self.id);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_subject_for_variant() {
        let campaign = Campaign::draft(1, "Spring news", "<p>Hi</p>", now()).with_ab_test(
            "Spring is here",
            50,
            WinnerMetric::Opens,
        );
        assert_eq!(campaign.subject_for(Some(Variant::A)), "Spring news");
        assert_eq!(campaign.subject_for(Some(Variant::B)), "Spring is here");
        assert_eq!(campaign.subject_for(None), "Spring news");
    }

    #[test]
    fn test_ab_without_subject_b_is_invalid() {
        let mut campaign = Campaign::draft(1, "Hello", "", now());
        campaign.ab_test_enabled = true;
        assert!(!campaign.is_ab_test());
        assert!(matches!(
            campaign.validate(),
            Err(CoreError::InvalidCampaign(_))
        ));
    }

    #[test]
    fn test_incomplete_recurrence_is_a_scheduling_error() {
        let mut spec = RecurrenceSpec::daily(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        spec.frequency = Frequency::Monthly;
        let campaign = Campaign::draft(1, "Monthly", "", now()).with_recurrence(spec);
        assert!(matches!(campaign.validate(), Err(CoreError::Scheduling(_))));
    }

    #[test]
    fn test_sent_campaign_is_frozen() {
        let mut campaign = Campaign::draft(9, "Hello", "", now());
        campaign.transition(CampaignStatus::Sending).unwrap();
        assert_eq!(campaign.ensure_editable(), Err(CoreError::Immutable(9)));
        campaign.transition(CampaignStatus::Sent).unwrap();
        let err = campaign.transition(CampaignStatus::Sending).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: CampaignStatus::Sent,
                to: CampaignStatus::Sending
            }
        );
    }

    #[test]
    fn test_resend_copy() {
        let mut original = Campaign::draft(3, "News", "<p>body</p>", now())
            .with_audience(TargetAudience::Both)
            .with_counties(["Cork"])
            .with_ab_test("Other", 30, WinnerMetric::Clicks);
        original.status = CampaignStatus::Sent;

        let copy = original.resend_copy(4, "Reminder: News", now());
        assert_eq!(copy.status, CampaignStatus::Draft);
        assert_eq!(copy.parent_id, Some(3));
        assert_eq!(copy.content, "<p>body</p>");
        assert!(!copy.is_ab_test());
        assert!(copy.target_counties.is_empty());
    }

    #[test]
    fn test_deserialize_minimal_campaign() {
        let campaign: Campaign = serde_json::from_str(
            r#"{"id": 5, "subject": "Hi", "created_at": "2025-01-01T00:00:00Z",
                "target_audience": "subscribers_only",
                "recurrence": {"frequency": "biweekly", "day": "fri", "time": "10:15"}}"#,
        )
        .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.ab_split_percentage, 50);
        assert_eq!(campaign.target_audience, TargetAudience::SubscribersOnly);
        assert!(campaign.is_recurring());
    }
}
