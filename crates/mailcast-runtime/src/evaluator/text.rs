//! Case-insensitive text predicates

use super::DataQualityFault;
use mailcast_core::{ConditionOperator, ConditionValue, SegmentField};

/// Text test on an optional attribute; a missing attribute counts as empty
pub(crate) fn compare_text(
    field: SegmentField,
    actual: Option<&str>,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    let actual = actual.map(str::trim).unwrap_or_default().to_lowercase();

    match (op, value) {
        (ConditionOperator::IsEmpty, _) => Ok(actual.is_empty()),
        (ConditionOperator::IsNotEmpty, _) => Ok(!actual.is_empty()),
        (ConditionOperator::Equals, ConditionValue::Text(expected)) => {
            Ok(actual == expected.trim().to_lowercase())
        }
        (ConditionOperator::NotEquals, ConditionValue::Text(expected)) => {
            Ok(actual != expected.trim().to_lowercase())
        }
        (ConditionOperator::Contains, ConditionValue::Text(needle)) => {
            Ok(actual.contains(&needle.trim().to_lowercase()))
        }
        (ConditionOperator::StartsWith, ConditionValue::Text(prefix)) => {
            Ok(actual.starts_with(&prefix.trim().to_lowercase()))
        }
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ConditionValue {
        ConditionValue::Text(s.to_string())
    }

    #[test]
    fn test_text_predicates_ignore_case() {
        let f = SegmentField::Location;
        let loc = Some("Ballincollig, Co. Cork");
        assert!(compare_text(f, loc, ConditionOperator::Contains, &text("CORK")).unwrap());
        assert!(compare_text(f, loc, ConditionOperator::StartsWith, &text("ballin")).unwrap());
        assert!(!compare_text(f, loc, ConditionOperator::Equals, &text("Cork")).unwrap());
        assert!(compare_text(f, loc, ConditionOperator::IsNotEmpty, &ConditionValue::Absent).unwrap());
    }

    #[test]
    fn test_missing_counts_as_empty() {
        let f = SegmentField::Bio;
        assert!(compare_text(f, None, ConditionOperator::IsEmpty, &ConditionValue::Absent).unwrap());
        assert!(compare_text(f, Some("   "), ConditionOperator::IsEmpty, &ConditionValue::Absent).unwrap());
        assert!(!compare_text(f, None, ConditionOperator::Contains, &text("x")).unwrap());
    }
}
