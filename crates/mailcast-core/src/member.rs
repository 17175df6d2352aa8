//! Member snapshot types
//!
//! Members are owned by the wider platform; this crate only reads them. An
//! [`AudienceSnapshot`] captures every member and external subscriber as of a
//! single point in time so that one resolution pass never sees a mix of old
//! and new data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Member identifier (also the audience sort key)
pub type MemberId = u64;

/// Community group identifier
pub type GroupId = u64;

/// Normalize an email address for comparison and keying.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal syntactic check used before an address enters the suppression list.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Activity tier derived by the platform from login behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    /// Logged in within 7 days
    High,
    /// Logged in 8-30 days ago
    Medium,
    /// No login for more than 30 days
    Low,
    /// Came back after a gap of 60+ days
    Returning,
}

impl ActivityTier {
    pub const ALL: [ActivityTier; 4] = [
        ActivityTier::High,
        ActivityTier::Medium,
        ActivityTier::Low,
        ActivityTier::Returning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityTier::High => "high",
            ActivityTier::Medium => "medium",
            ActivityTier::Low => "low",
            ActivityTier::Returning => "returning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.as_str() == value)
    }
}

/// CommunityRank percentile band used by segment rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankBand {
    #[serde(rename = "top_10")]
    Top10,
    #[serde(rename = "top_25")]
    Top25,
    #[serde(rename = "top_50")]
    Top50,
    #[serde(rename = "bottom_25")]
    Bottom25,
}

impl RankBand {
    pub const ALL: [RankBand; 4] = [
        RankBand::Top10,
        RankBand::Top25,
        RankBand::Top50,
        RankBand::Bottom25,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankBand::Top10 => "top_10",
            RankBand::Top25 => "top_25",
            RankBand::Top50 => "top_50",
            RankBand::Bottom25 => "bottom_25",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.as_str() == value)
    }

    /// Whether a percentile (0-100) falls inside this band
    pub fn contains(&self, percentile: f64) -> bool {
        match self {
            RankBand::Top10 => percentile >= 90.0,
            RankBand::Top25 => percentile >= 75.0,
            RankBand::Top50 => percentile >= 50.0,
            RankBand::Bottom25 => percentile <= 25.0,
        }
    }
}

/// Email engagement tier derived from open and click behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTier {
    HighlyEngaged,
    Engaged,
    Passive,
    Dormant,
    NeverOpened,
    NoNewsletters,
}

impl EngagementTier {
    /// Tiers an administrator can target
    pub const SELECTABLE: [EngagementTier; 5] = [
        EngagementTier::HighlyEngaged,
        EngagementTier::Engaged,
        EngagementTier::Passive,
        EngagementTier::Dormant,
        EngagementTier::NeverOpened,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementTier::HighlyEngaged => "highly_engaged",
            EngagementTier::Engaged => "engaged",
            EngagementTier::Passive => "passive",
            EngagementTier::Dormant => "dormant",
            EngagementTier::NeverOpened => "never_opened",
            EngagementTier::NoNewsletters => "no_newsletters",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::SELECTABLE.into_iter().find(|tier| tier.as_str() == value)
    }

    /// Classify from newsletters received and open/click rates (percent).
    pub fn classify(newsletters_received: u32, open_rate: f64, click_rate: f64) -> Self {
        if newsletters_received == 0 {
            EngagementTier::NoNewsletters
        } else if open_rate >= 70.0 && click_rate >= 30.0 {
            EngagementTier::HighlyEngaged
        } else if open_rate >= 40.0 && click_rate >= 10.0 {
            EngagementTier::Engaged
        } else if open_rate >= 20.0 {
            EngagementTier::Passive
        } else if open_rate > 0.0 {
            EngagementTier::Dormant
        } else {
            EngagementTier::NeverOpened
        }
    }
}

/// Per-member email engagement metrics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmailEngagement {
    /// Unique opens / newsletters sent, in percent
    #[serde(default)]
    pub open_rate: f64,
    /// Unique clicks / unique opens, in percent
    #[serde(default)]
    pub click_rate: f64,
    #[serde(default)]
    pub newsletters_received: u32,
}

impl EmailEngagement {
    pub fn tier(&self) -> EngagementTier {
        EngagementTier::classify(self.newsletters_received, self.open_rate, self.click_rate)
    }
}

fn default_true() -> bool {
    true
}

fn default_role() -> String {
    "user".to_string()
}

fn default_profile_type() -> String {
    "individual".to_string()
}

/// A platform member as seen by the audience engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_approved: bool,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_profile_type")]
    pub profile_type: String,
    /// Free-text location as entered on the profile
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub listing_count: u32,
    #[serde(default)]
    pub groups: BTreeSet<GroupId>,
    #[serde(default)]
    pub activity_tier: Option<ActivityTier>,
    /// CommunityRank percentile (0-100)
    #[serde(default)]
    pub community_rank_percentile: Option<f64>,
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub email_engagement: EmailEngagement,
}

impl Member {
    /// Create an approved member with default profile attributes
    pub fn new(id: MemberId, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            name: None,
            is_approved: true,
            role: default_role(),
            profile_type: default_profile_type(),
            location: None,
            county: None,
            town: None,
            coordinates: None,
            bio: None,
            avatar_url: None,
            created_at,
            last_login_at: None,
            listing_count: 0,
            groups: BTreeSet::new(),
            activity_tier: None,
            community_rank_percentile: None,
            transaction_count: 0,
            email_engagement: EmailEngagement::default(),
        }
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    pub fn with_town(mut self, town: impl Into<String>) -> Self {
        self.town = Some(town.into());
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some(GeoPoint::new(lat, lng));
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    pub fn with_last_login(mut self, at: DateTime<Utc>) -> Self {
        self.last_login_at = Some(at);
        self
    }

    /// Address used for delivery, normalized; `None` if the member has no email
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
    }

    /// Approved members with an address are the only ones that can receive mail
    pub fn is_mailable(&self) -> bool {
        self.is_approved && self.normalized_email().is_some()
    }

    /// Whole days since the last login, falling back to the join date
    pub fn days_since_login(&self, now: DateTime<Utc>) -> i64 {
        let reference = self.last_login_at.unwrap_or(self.created_at);
        (now - reference).num_days()
    }

    /// Whole days since the member joined
    pub fn days_since_joined(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    pub fn recipient(&self) -> Option<Recipient> {
        self.normalized_email().map(|email| Recipient {
            email,
            member_id: Some(self.id),
            name: self.name.clone(),
        })
    }
}

/// External newsletter subscriber, optionally linked to a member account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    #[serde(default)]
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Subscriber {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            member_id: None,
            name: None,
            is_active: true,
        }
    }

    pub fn linked_to(mut self, member_id: MemberId) -> Self {
        self.member_id = Some(member_id);
        self
    }
}

/// A resolved delivery target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    /// Normalized address
    pub email: String,
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: &str, member_id: Option<MemberId>) -> Self {
        Self {
            email: normalize_email(email),
            member_id,
            name: None,
        }
    }
}

/// All members and subscribers as of one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceSnapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

impl AudienceSnapshot {
    pub fn new(taken_at: DateTime<Utc>, members: Vec<Member>) -> Self {
        Self {
            taken_at,
            members,
            subscribers: Vec::new(),
        }
    }

    pub fn with_subscribers(mut self, subscribers: Vec<Subscriber>) -> Self {
        self.subscribers = subscribers;
        self
    }
}
