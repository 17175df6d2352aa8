//! Conditions and rule sets
//!
//! A [`Condition`] can only be obtained through validation: the operator must
//! belong to the field's operator set and the value must have the shape the
//! (field, operator) pair requires. Deserialization goes through the same
//! checks, so a loaded segment is always well-formed.

use super::field::SegmentField;
use super::operator::ConditionOperator;
use super::value::{ConditionValue, ValueKind};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single (field, operator, value) predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    field: SegmentField,
    operator: ConditionOperator,
    value: ConditionValue,
}

impl Condition {
    /// Build a validated condition
    pub fn new(
        field: SegmentField,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> Result<Self> {
        validate(field, operator, &value).map_err(CoreError::InvalidCondition)?;
        Ok(Self {
            field,
            operator,
            value,
        })
    }

    /// Build a condition from the loosely-typed form used by forms and files
    pub fn from_raw(field: &str, operator: &str, value: &JsonValue) -> Result<Self> {
        RawCondition {
            field: field.to_string(),
            operator: operator.to_string(),
            value: value.clone(),
        }
        .parse()
        .map_err(CoreError::InvalidCondition)
    }

    pub fn field(&self) -> SegmentField {
        self.field
    }

    pub fn operator(&self) -> ConditionOperator {
        self.operator
    }

    pub fn value(&self) -> &ConditionValue {
        &self.value
    }
}

fn validate(
    field: SegmentField,
    operator: ConditionOperator,
    value: &ConditionValue,
) -> std::result::Result<(), String> {
    if !field.supports(operator) {
        return Err(format!(
            "Operator '{}' is not valid for field '{}'",
            operator, field
        ));
    }
    let expected = ValueKind::expected(field, operator);
    if value.kind() != expected {
        return Err(format!(
            "Field '{}' with operator '{}' expects a {:?} value",
            field, operator, expected
        ));
    }
    value.check(field)
}

/// Wire form of a condition
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCondition {
    #[serde(default)]
    field: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    value: JsonValue,
}

impl RawCondition {
    fn parse(self) -> std::result::Result<Condition, String> {
        if self.field.trim().is_empty() {
            return Err("Field is required".to_string());
        }
        let field = SegmentField::parse(self.field.trim())
            .ok_or_else(|| format!("Invalid field '{}'", self.field))?;

        if self.operator.trim().is_empty() {
            return Err("Operator is required".to_string());
        }
        let operator = ConditionOperator::parse(self.operator.trim())
            .ok_or_else(|| format!("Invalid operator '{}'", self.operator))?;

        if !field.supports(operator) {
            return Err(format!(
                "Operator '{}' is not valid for field '{}'",
                operator, field
            ));
        }

        let kind = ValueKind::expected(field, operator);
        let value = ConditionValue::from_json(field, kind, &self.value)?;
        Ok(Condition {
            field,
            operator,
            value,
        })
    }
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> std::result::Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        RawCondition {
            field: condition.field.as_str().to_string(),
            operator: condition.operator.as_str().to_string(),
            value: condition.value.to_json(),
        }
    }
}

/// How a rule set combines its conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Every condition must hold
    #[default]
    All,
    /// At least one condition must hold
    Any,
}

/// Ordered conditions plus their combinator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawRules")]
pub struct SegmentRules {
    #[serde(rename = "match")]
    pub match_type: MatchType,
    pub conditions: Vec<Condition>,
}

impl SegmentRules {
    pub fn new(match_type: MatchType, conditions: Vec<Condition>) -> Self {
        Self {
            match_type,
            conditions,
        }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::new(MatchType::All, conditions)
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::new(MatchType::Any, conditions)
    }

    /// An empty rule set matches every member
    pub fn is_unfiltered(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse a rule set from its JSON form, reporting the 1-based position of
    /// the first invalid condition.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let raw: RawRules = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::InvalidSegment(e.to_string()))?;
        raw.into_rules()
    }
}

#[derive(Debug, Deserialize)]
struct RawRules {
    #[serde(rename = "match", default)]
    match_type: Option<String>,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

impl RawRules {
    fn into_rules(self) -> Result<SegmentRules> {
        let match_type = match self.match_type.as_deref() {
            Some("all") => MatchType::All,
            Some("any") => MatchType::Any,
            _ => {
                return Err(CoreError::InvalidSegment(
                    "Rules must have a valid \"match\" type (all or any)".to_string(),
                ))
            }
        };

        let conditions = self
            .conditions
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.parse().map_err(|message| CoreError::InvalidRule {
                    position: index + 1,
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SegmentRules {
            match_type,
            conditions,
        })
    }
}

impl TryFrom<RawRules> for SegmentRules {
    type Error = CoreError;

    fn try_from(raw: RawRules) -> Result<Self> {
        raw.into_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_operator_outside_field_set() {
        let err = Condition::new(
            SegmentField::County,
            ConditionOperator::Equals,
            ConditionValue::places(["Cork"]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCondition(_)));
    }

    #[test]
    fn test_new_rejects_wrong_value_shape() {
        let err = Condition::new(
            SegmentField::ListingCount,
            ConditionOperator::AtLeast,
            ConditionValue::Text("five".into()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("listing_count"));
    }

    #[test]
    fn test_condition_serde_round_trip() {
        let condition: Condition = serde_json::from_value(json!({
            "field": "county",
            "operator": "in_list",
            "value": ["Cork", "KERRY"]
        }))
        .unwrap();
        assert_eq!(condition.operator(), ConditionOperator::In);
        assert_eq!(condition.value(), &ConditionValue::places(["cork", "kerry"]));

        let back = serde_json::to_value(&condition).unwrap();
        assert_eq!(back["operator"], "in");
        assert_eq!(back["value"], json!(["cork", "kerry"]));
    }

    #[test]
    fn test_rules_report_condition_position() {
        let err = SegmentRules::from_json(&json!({
            "match": "all",
            "conditions": [
                {"field": "role", "operator": "equals", "value": "user"},
                {"field": "shoe_size", "operator": "equals", "value": 9}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Condition #2: Invalid field 'shoe_size'");
    }

    #[test]
    fn test_rules_require_match_type() {
        let err = SegmentRules::from_json(&json!({"match": "most", "conditions": []})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSegment(_)));
    }

    #[test]
    fn test_empty_rules_are_unfiltered() {
        let rules = SegmentRules::from_json(&json!({"match": "any", "conditions": []})).unwrap();
        assert!(rules.is_unfiltered());
        assert_eq!(rules.match_type, MatchType::Any);
    }

    #[test]
    fn test_rules_yaml() {
        let rules: SegmentRules = serde_yaml::from_str(
            r#"
match: any
conditions:
  - field: login_recency
    operator: equals
    value: never
  - field: geo_radius
    operator: within_radius
    value: { lat: 53.35, lng: -6.26, radius_km: 25 }
"#,
        )
        .unwrap();
        assert_eq!(rules.conditions.len(), 2);
        assert_eq!(rules.conditions[0].value(), &ConditionValue::Never);
    }
}
