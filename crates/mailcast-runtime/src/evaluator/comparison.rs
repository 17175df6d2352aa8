//! Numeric and elapsed-time comparisons

use super::DataQualityFault;
use mailcast_core::{ConditionOperator, ConditionValue, SegmentField};

/// Compare a numeric member attribute against a condition value
pub(crate) fn compare_number(
    field: SegmentField,
    actual: f64,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    match (op, value) {
        (ConditionOperator::Equals, ConditionValue::Number(n)) => Ok(actual == *n),
        (ConditionOperator::NotEquals, ConditionValue::Number(n)) => Ok(actual != *n),
        (ConditionOperator::GreaterThan, ConditionValue::Number(n)) => Ok(actual > *n),
        (ConditionOperator::LessThan, ConditionValue::Number(n)) => Ok(actual < *n),
        (ConditionOperator::AtLeast, ConditionValue::Number(n)) => Ok(actual >= *n),
        (ConditionOperator::AtMost, ConditionValue::Number(n)) => Ok(actual <= *n),
        (ConditionOperator::Between, ConditionValue::Range(range)) => Ok(range.contains(actual)),
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}

/// `newer_than_days N` holds for elapsed <= N, `older_than_days N` for elapsed > N
pub(crate) fn compare_elapsed(
    field: SegmentField,
    elapsed_days: i64,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    match (op, value) {
        (ConditionOperator::NewerThanDays, ConditionValue::Days(days)) => {
            Ok(elapsed_days <= i64::from(*days))
        }
        (ConditionOperator::OlderThanDays, ConditionValue::Days(days)) => {
            Ok(elapsed_days > i64::from(*days))
        }
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}
