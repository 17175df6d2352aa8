//! Segmentable member fields and their declared types

use super::operator::ConditionOperator;
use serde::{Deserialize, Serialize};

/// Declared type of a segment field; decides the value shape a condition carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Select,
    Text,
    Number,
    Date,
    Boolean,
    GeoRadius,
    CountySelect,
    TownSelect,
    GroupSelect,
}

/// Member attributes a segment condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentField {
    // Profile
    Role,
    ProfileType,
    Location,
    Bio,
    Avatar,
    County,
    Town,
    GeoRadius,
    GroupMembership,
    CreatedAt,
    HasListings,
    ListingCount,

    // Engagement
    ActivityScore,
    LoginRecency,
    TransactionCount,
    CommunityRank,

    // Email
    EmailOpenRate,
    EmailClickRate,
    NewslettersReceived,
    EmailEngagementLevel,
}

use ConditionOperator as Op;

const EQUALITY: &[ConditionOperator] = &[Op::Equals, Op::NotEquals];
const COUNTS: &[ConditionOperator] = &[
    Op::Equals,
    Op::GreaterThan,
    Op::LessThan,
    Op::AtLeast,
    Op::AtMost,
    Op::Between,
];
const RATES: &[ConditionOperator] = &[
    Op::AtLeast,
    Op::AtMost,
    Op::GreaterThan,
    Op::LessThan,
    Op::Between,
];

impl SegmentField {
    pub const ALL: [SegmentField; 20] = [
        SegmentField::Role,
        SegmentField::ProfileType,
        SegmentField::Location,
        SegmentField::Bio,
        SegmentField::Avatar,
        SegmentField::County,
        SegmentField::Town,
        SegmentField::GeoRadius,
        SegmentField::GroupMembership,
        SegmentField::CreatedAt,
        SegmentField::HasListings,
        SegmentField::ListingCount,
        SegmentField::ActivityScore,
        SegmentField::LoginRecency,
        SegmentField::TransactionCount,
        SegmentField::CommunityRank,
        SegmentField::EmailOpenRate,
        SegmentField::EmailClickRate,
        SegmentField::NewslettersReceived,
        SegmentField::EmailEngagementLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentField::Role => "role",
            SegmentField::ProfileType => "profile_type",
            SegmentField::Location => "location",
            SegmentField::Bio => "bio",
            SegmentField::Avatar => "avatar",
            SegmentField::County => "county",
            SegmentField::Town => "town",
            SegmentField::GeoRadius => "geo_radius",
            SegmentField::GroupMembership => "group_membership",
            SegmentField::CreatedAt => "created_at",
            SegmentField::HasListings => "has_listings",
            SegmentField::ListingCount => "listing_count",
            SegmentField::ActivityScore => "activity_score",
            SegmentField::LoginRecency => "login_recency",
            SegmentField::TransactionCount => "transaction_count",
            SegmentField::CommunityRank => "community_rank",
            SegmentField::EmailOpenRate => "email_open_rate",
            SegmentField::EmailClickRate => "email_click_rate",
            SegmentField::NewslettersReceived => "newsletters_received",
            SegmentField::EmailEngagementLevel => "email_engagement_level",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    /// Human-readable label for the admin rule builder
    pub fn label(&self) -> &'static str {
        match self {
            SegmentField::Role => "User Role",
            SegmentField::ProfileType => "Profile Type",
            SegmentField::Location => "Location Text",
            SegmentField::Bio => "Bio/About",
            SegmentField::Avatar => "Profile Photo",
            SegmentField::County => "County",
            SegmentField::Town => "Town/City",
            SegmentField::GeoRadius => "Geographic Area",
            SegmentField::GroupMembership => "Group Membership",
            SegmentField::CreatedAt => "Member Since",
            SegmentField::HasListings => "Has Active Listings",
            SegmentField::ListingCount => "Number of Listings",
            SegmentField::ActivityScore => "Activity Score",
            SegmentField::LoginRecency => "Last Login",
            SegmentField::TransactionCount => "Transaction Count",
            SegmentField::CommunityRank => "CommunityRank",
            SegmentField::EmailOpenRate => "Email Open Rate (%)",
            SegmentField::EmailClickRate => "Email Click Rate (%)",
            SegmentField::NewslettersReceived => "Newsletters Received",
            SegmentField::EmailEngagementLevel => "Email Engagement",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            SegmentField::Role
            | SegmentField::ProfileType
            | SegmentField::ActivityScore
            | SegmentField::CommunityRank
            | SegmentField::EmailEngagementLevel => FieldType::Select,
            SegmentField::Location | SegmentField::Bio | SegmentField::Avatar => FieldType::Text,
            SegmentField::County => FieldType::CountySelect,
            SegmentField::Town => FieldType::TownSelect,
            SegmentField::GeoRadius => FieldType::GeoRadius,
            SegmentField::GroupMembership => FieldType::GroupSelect,
            SegmentField::CreatedAt => FieldType::Date,
            SegmentField::HasListings => FieldType::Boolean,
            SegmentField::ListingCount
            | SegmentField::LoginRecency
            | SegmentField::TransactionCount
            | SegmentField::EmailOpenRate
            | SegmentField::EmailClickRate
            | SegmentField::NewslettersReceived => FieldType::Number,
        }
    }

    /// Operators this field accepts
    pub fn operators(&self) -> &'static [ConditionOperator] {
        match self {
            SegmentField::Role
            | SegmentField::ProfileType
            | SegmentField::ActivityScore
            | SegmentField::EmailEngagementLevel => EQUALITY,
            SegmentField::Location => &[
                Op::Equals,
                Op::Contains,
                Op::StartsWith,
                Op::IsEmpty,
                Op::IsNotEmpty,
            ],
            SegmentField::Bio => &[Op::IsEmpty, Op::IsNotEmpty, Op::Contains],
            SegmentField::Avatar => &[Op::IsEmpty, Op::IsNotEmpty],
            SegmentField::County | SegmentField::Town => &[Op::In, Op::NotIn],
            SegmentField::GeoRadius => &[Op::Within],
            SegmentField::GroupMembership => &[Op::MemberOf, Op::NotMemberOf],
            SegmentField::CreatedAt => &[
                Op::OlderThanDays,
                Op::NewerThanDays,
                Op::Before,
                Op::After,
            ],
            SegmentField::HasListings => &[Op::Equals],
            SegmentField::ListingCount | SegmentField::TransactionCount => COUNTS,
            SegmentField::LoginRecency => &[Op::NewerThanDays, Op::OlderThanDays, Op::Equals],
            SegmentField::CommunityRank => &[Op::Equals],
            SegmentField::EmailOpenRate | SegmentField::EmailClickRate => RATES,
            SegmentField::NewslettersReceived => COUNTS,
        }
    }

    pub fn supports(&self, operator: ConditionOperator) -> bool {
        self.operators().contains(&operator)
    }

    /// Fixed option values for select fields that validate their value
    pub fn options(&self) -> &'static [&'static str] {
        match self {
            SegmentField::Role => &["user", "admin"],
            SegmentField::ProfileType => &["individual", "organisation"],
            SegmentField::ActivityScore => &["high", "medium", "low", "returning"],
            SegmentField::CommunityRank => &["top_10", "top_25", "top_50", "bottom_25"],
            SegmentField::EmailEngagementLevel => &[
                "highly_engaged",
                "engaged",
                "passive",
                "dormant",
                "never_opened",
            ],
            _ => &[],
        }
    }

    /// Values are percentages and must stay within 0-100
    pub fn is_percentage(&self) -> bool {
        matches!(self, SegmentField::EmailOpenRate | SegmentField::EmailClickRate)
    }

    /// Description of every field, used to drive the rule builder form
    pub fn catalogue() -> Vec<FieldSpec> {
        Self::ALL
            .into_iter()
            .map(|field| FieldSpec {
                field,
                label: field.label(),
                field_type: field.field_type(),
                operators: field.operators().to_vec(),
                options: field.options().to_vec(),
            })
            .collect()
    }
}

impl std::fmt::Display for SegmentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalogue entry for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub field: SegmentField,
    pub label: &'static str,
    pub field_type: FieldType,
    pub operators: Vec<ConditionOperator>,
    pub options: Vec<&'static str>,
}
