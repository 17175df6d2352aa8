//! Operators for segment conditions

use serde::{Deserialize, Serialize};

/// Condition operators
///
/// The set of operators legal for a condition depends on its field; see
/// [`SegmentField::operators`](super::SegmentField::operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    // Equality
    Equals,
    NotEquals,

    // Text
    Contains,
    StartsWith,
    IsEmpty,
    IsNotEmpty,

    // Numeric
    AtLeast,
    AtMost,
    GreaterThan,
    LessThan,
    Between,

    // Elapsed time / dates
    NewerThanDays,
    OlderThanDays,
    Before,
    After,

    // Set membership
    #[serde(alias = "in_list")]
    In,
    #[serde(alias = "not_in_list")]
    NotIn,
    MemberOf,
    NotMemberOf,

    // Geographic
    #[serde(alias = "within_radius")]
    Within,
}

impl ConditionOperator {
    pub const ALL: [ConditionOperator; 20] = [
        ConditionOperator::Equals,
        ConditionOperator::NotEquals,
        ConditionOperator::Contains,
        ConditionOperator::StartsWith,
        ConditionOperator::IsEmpty,
        ConditionOperator::IsNotEmpty,
        ConditionOperator::AtLeast,
        ConditionOperator::AtMost,
        ConditionOperator::GreaterThan,
        ConditionOperator::LessThan,
        ConditionOperator::Between,
        ConditionOperator::NewerThanDays,
        ConditionOperator::OlderThanDays,
        ConditionOperator::Before,
        ConditionOperator::After,
        ConditionOperator::In,
        ConditionOperator::NotIn,
        ConditionOperator::MemberOf,
        ConditionOperator::NotMemberOf,
        ConditionOperator::Within,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "starts_with",
            ConditionOperator::IsEmpty => "is_empty",
            ConditionOperator::IsNotEmpty => "is_not_empty",
            ConditionOperator::AtLeast => "at_least",
            ConditionOperator::AtMost => "at_most",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Between => "between",
            ConditionOperator::NewerThanDays => "newer_than_days",
            ConditionOperator::OlderThanDays => "older_than_days",
            ConditionOperator::Before => "before",
            ConditionOperator::After => "after",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
            ConditionOperator::MemberOf => "member_of",
            ConditionOperator::NotMemberOf => "not_member_of",
            ConditionOperator::Within => "within",
        }
    }

    /// Parse an operator name, accepting the legacy list/radius spellings
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "in_list" => Some(ConditionOperator::In),
            "not_in_list" => Some(ConditionOperator::NotIn),
            "within_radius" => Some(ConditionOperator::Within),
            _ => Self::ALL.into_iter().find(|op| op.as_str() == name),
        }
    }

    /// Returns true for operators that negate a positive test
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            ConditionOperator::NotEquals | ConditionOperator::NotIn | ConditionOperator::NotMemberOf
        )
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
