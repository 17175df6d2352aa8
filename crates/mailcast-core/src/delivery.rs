//! Delivery, bounce and engagement records

use crate::campaign::CampaignId;
use crate::member::{normalize_email, MemberId, Recipient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A/B message version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handing a message to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    #[default]
    Pending,
    Sent,
    Failed,
}

/// One recipient of one campaign send
///
/// Created as `pending` at dispatch time; only the outcome (and its
/// timestamp / error) changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub campaign_id: CampaignId,
    pub email: String,
    #[serde(default)]
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub outcome: DeliveryOutcome,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeliveryRecord {
    pub fn pending(
        campaign_id: CampaignId,
        recipient: &Recipient,
        variant: Option<Variant>,
        queued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            email: recipient.email.clone(),
            member_id: recipient.member_id,
            variant,
            outcome: DeliveryOutcome::Pending,
            queued_at,
            sent_at: None,
            error: None,
        }
    }

    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.outcome = DeliveryOutcome::Sent;
        self.sent_at = Some(at);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.outcome = DeliveryOutcome::Failed;
        self.error = Some(error.into());
    }
}

/// Kind of bounce reported by the mail provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceType {
    Hard,
    Soft,
    Complaint,
}

impl BounceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BounceType::Hard => "hard",
            BounceType::Soft => "soft",
            BounceType::Complaint => "complaint",
        }
    }
}

/// Bounce or complaint for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceEvent {
    pub email: String,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    pub bounce_type: BounceType,
    #[serde(default)]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl BounceEvent {
    pub fn new(email: &str, bounce_type: BounceType, occurred_at: DateTime<Utc>) -> Self {
        Self {
            email: normalize_email(email),
            campaign_id: None,
            bounce_type,
            reason: None,
            occurred_at,
        }
    }

    pub fn for_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Open,
    Click,
}

/// Open or click tracked for a delivered message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub campaign_id: CampaignId,
    pub email: String,
    pub kind: EngagementKind,
    /// Clicked link; `None` for opens
    #[serde(default)]
    pub url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EngagementEvent {
    pub fn open(campaign_id: CampaignId, email: &str, occurred_at: DateTime<Utc>) -> Self {
        Self {
            campaign_id,
            email: normalize_email(email),
            kind: EngagementKind::Open,
            url: None,
            occurred_at,
        }
    }

    pub fn click(
        campaign_id: CampaignId,
        email: &str,
        url: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            email: normalize_email(email),
            kind: EngagementKind::Click,
            url: Some(url.into()),
            occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_outcome_changes() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let recipient = Recipient::new("A@B.ie", Some(4));
        let mut record = DeliveryRecord::pending(1, &recipient, Some(Variant::B), at);
        assert_eq!(record.email, "a@b.ie");
        assert_eq!(record.outcome, DeliveryOutcome::Pending);

        record.mark_failed("mailbox unavailable");
        assert_eq!(record.outcome, DeliveryOutcome::Failed);

        record.mark_sent(at);
        assert_eq!(record.outcome, DeliveryOutcome::Sent);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_variant_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Variant::A).unwrap(), r#""A""#);
        let event = BounceEvent::new(" X@Y.ie", BounceType::Complaint, Utc::now());
        assert_eq!(event.email, "x@y.ie");
        assert_eq!(
            serde_json::to_value(&event).unwrap()["bounce_type"],
            "complaint"
        );
    }
}
