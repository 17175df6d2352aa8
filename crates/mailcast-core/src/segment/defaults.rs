//! Stock segments seeded for a new community

use super::{
    Condition, ConditionOperator, ConditionValue, Segment, SegmentField, SegmentId, SegmentRules,
};
use crate::error::Result;

/// Build the stock segments, numbering them from `first_id`.
pub fn default_segments(first_id: SegmentId) -> Result<Vec<Segment>> {
    let definitions = [
        (
            "New Members (30 days)",
            "Members who joined in the last 30 days",
            Condition::new(
                SegmentField::CreatedAt,
                ConditionOperator::NewerThanDays,
                ConditionValue::Days(30),
            )?,
        ),
        (
            "Long-term Members (1+ year)",
            "Members who have been active for over a year",
            Condition::new(
                SegmentField::CreatedAt,
                ConditionOperator::OlderThanDays,
                ConditionValue::Days(365),
            )?,
        ),
        (
            "Active Sellers",
            "Members with at least one active listing",
            Condition::new(
                SegmentField::HasListings,
                ConditionOperator::Equals,
                ConditionValue::Flag(true),
            )?,
        ),
        (
            "Organisations",
            "Organisation accounts only",
            Condition::new(
                SegmentField::ProfileType,
                ConditionOperator::Equals,
                ConditionValue::Text("organisation".into()),
            )?,
        ),
        (
            "Individuals",
            "Individual user accounts",
            Condition::new(
                SegmentField::ProfileType,
                ConditionOperator::Equals,
                ConditionValue::Text("individual".into()),
            )?,
        ),
        (
            "Never Logged In",
            "Members who have never logged in",
            Condition::new(
                SegmentField::LoginRecency,
                ConditionOperator::Equals,
                ConditionValue::Never,
            )?,
        ),
    ];

    Ok(definitions
        .into_iter()
        .zip(first_id..)
        .map(|((name, description, condition), id)| {
            Segment::new(id, name, SegmentRules::all(vec![condition])).with_description(description)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_segments() {
        let segments = default_segments(10).unwrap();
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0].id, 10);
        assert_eq!(segments[5].name, "Never Logged In");
        assert!(segments.iter().all(|s| s.is_active && s.rules.conditions.len() == 1));
    }
}
