//! Place and group set membership

use super::DataQualityFault;
use mailcast_core::{ConditionOperator, ConditionValue, GroupId, SegmentField};
use std::collections::BTreeSet;

/// Whether any of the member's place attributes names a place in `places`.
///
/// The structured value is compared exactly (case-folded); when it is
/// missing, the free-text location is searched for any of the names.
pub(crate) fn place_matches(
    structured: Option<&str>,
    free_text: Option<&str>,
    places: &BTreeSet<String>,
) -> bool {
    match structured.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        Some(place) => places.contains(&place),
        None => match free_text {
            Some(text) => {
                let text = text.to_lowercase();
                places.iter().any(|place| text.contains(place.as_str()))
            }
            None => false,
        },
    }
}

pub(crate) fn compare_places(
    field: SegmentField,
    structured: Option<&str>,
    free_text: Option<&str>,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    match (op, value) {
        (ConditionOperator::In, ConditionValue::Places(places)) => {
            Ok(place_matches(structured, free_text, places))
        }
        (ConditionOperator::NotIn, ConditionValue::Places(places)) => {
            Ok(!place_matches(structured, free_text, places))
        }
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}

pub(crate) fn compare_groups(
    field: SegmentField,
    member_groups: &BTreeSet<GroupId>,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    match (op, value) {
        (ConditionOperator::MemberOf, ConditionValue::Groups(groups)) => {
            Ok(!member_groups.is_disjoint(groups))
        }
        (ConditionOperator::NotMemberOf, ConditionValue::Groups(groups)) => {
            Ok(member_groups.is_disjoint(groups))
        }
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn places(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_lowercase()).collect()
    }

    #[test]
    fn test_structured_place_wins_over_free_text() {
        let set = places(&["Cork"]);
        assert!(place_matches(Some(" CORK "), None, &set));
        assert!(!place_matches(Some("Kerry"), Some("near Cork"), &set));
        assert!(place_matches(None, Some("Mallow, Co. Cork"), &set));
        assert!(!place_matches(None, None, &set));
    }

    #[test]
    fn test_groups() {
        let member: BTreeSet<GroupId> = [1, 4].into_iter().collect();
        let wanted = ConditionValue::groups([4, 9]);
        let f = SegmentField::GroupMembership;
        assert!(compare_groups(f, &member, ConditionOperator::MemberOf, &wanted).unwrap());
        assert!(!compare_groups(f, &member, ConditionOperator::NotMemberOf, &wanted).unwrap());
        assert!(compare_groups(f, &BTreeSet::new(), ConditionOperator::NotMemberOf, &wanted).unwrap());
    }
}
