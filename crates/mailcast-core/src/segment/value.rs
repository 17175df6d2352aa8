//! Typed condition values
//!
//! Raw rule values arrive as loosely-typed JSON (a scalar, a list of names, a
//! list of group ids or a `{lat, lng, radius_km}` object). They are converted
//! once, when the condition is built, into a [`ConditionValue`] whose variant
//! is fixed by the field type and operator. Evaluation never re-parses.

use super::field::SegmentField;
use super::operator::ConditionOperator;
use crate::member::{ActivityTier, EngagementTier, GroupId, RankBand};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;

/// Centre point and radius for geographic targeting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRadius {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

/// Inclusive numeric range for `between`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: f64,
    pub max: f64,
}

impl NumberRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Validated value of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// No operand (`is_empty` / `is_not_empty`)
    Absent,
    Text(String),
    Number(f64),
    Range(NumberRange),
    Days(u32),
    /// `login_recency equals "never"`
    Never,
    Date(NaiveDate),
    Flag(bool),
    Activity(ActivityTier),
    Rank(RankBand),
    Engagement(EngagementTier),
    /// County or town names, case-folded
    Places(BTreeSet<String>),
    Groups(BTreeSet<GroupId>),
    Radius(GeoRadius),
}

/// Shape a value must have for a (field, operator) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Absent,
    Text,
    Number,
    Range,
    Days,
    Never,
    Date,
    Flag,
    Activity,
    Rank,
    Engagement,
    Places,
    Groups,
    Radius,
}

impl ValueKind {
    /// The value shape required by `field` under `operator`.
    ///
    /// Callers must check `field.supports(operator)` first.
    pub fn expected(field: SegmentField, operator: ConditionOperator) -> Self {
        use ConditionOperator as Op;
        use SegmentField as F;

        match (field, operator) {
            (_, Op::IsEmpty | Op::IsNotEmpty) => ValueKind::Absent,
            (_, Op::Between) => ValueKind::Range,
            (_, Op::NewerThanDays | Op::OlderThanDays) => ValueKind::Days,
            (F::LoginRecency, Op::Equals) => ValueKind::Never,
            (F::CreatedAt, _) => ValueKind::Date,
            (F::HasListings, _) => ValueKind::Flag,
            (F::ActivityScore, _) => ValueKind::Activity,
            (F::CommunityRank, _) => ValueKind::Rank,
            (F::EmailEngagementLevel, _) => ValueKind::Engagement,
            (F::County | F::Town, _) => ValueKind::Places,
            (F::GroupMembership, _) => ValueKind::Groups,
            (F::GeoRadius, _) => ValueKind::Radius,
            (F::Role | F::ProfileType | F::Location | F::Bio | F::Avatar, _) => ValueKind::Text,
            (
                F::ListingCount
                | F::TransactionCount
                | F::EmailOpenRate
                | F::EmailClickRate
                | F::NewslettersReceived
                | F::LoginRecency,
                _,
            ) => ValueKind::Number,
        }
    }
}

impl ConditionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConditionValue::Absent => ValueKind::Absent,
            ConditionValue::Text(_) => ValueKind::Text,
            ConditionValue::Number(_) => ValueKind::Number,
            ConditionValue::Range(_) => ValueKind::Range,
            ConditionValue::Days(_) => ValueKind::Days,
            ConditionValue::Never => ValueKind::Never,
            ConditionValue::Date(_) => ValueKind::Date,
            ConditionValue::Flag(_) => ValueKind::Flag,
            ConditionValue::Activity(_) => ValueKind::Activity,
            ConditionValue::Rank(_) => ValueKind::Rank,
            ConditionValue::Engagement(_) => ValueKind::Engagement,
            ConditionValue::Places(_) => ValueKind::Places,
            ConditionValue::Groups(_) => ValueKind::Groups,
            ConditionValue::Radius(_) => ValueKind::Radius,
        }
    }

    /// Build a place set from names (trimmed and case-folded)
    pub fn places<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ConditionValue::Places(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    pub fn groups(ids: impl IntoIterator<Item = GroupId>) -> Self {
        ConditionValue::Groups(ids.into_iter().collect())
    }

    /// Check the value's content beyond its shape (ranges, emptiness).
    pub(crate) fn check(&self, field: SegmentField) -> Result<(), String> {
        match self {
            ConditionValue::Number(n) => {
                if !n.is_finite() {
                    return Err(format!("Field '{}' requires a numeric value", field));
                }
                if field.is_percentage() && !(0.0..=100.0).contains(n) {
                    return Err("Percentage must be between 0 and 100".to_string());
                }
                if *n < 0.0 {
                    return Err(format!("Field '{}' cannot be negative", field));
                }
            }
            ConditionValue::Range(range) => {
                if !range.min.is_finite() || !range.max.is_finite() {
                    return Err(format!("Field '{}' requires a numeric range", field));
                }
                if range.min > range.max {
                    return Err("Range minimum must not exceed maximum".to_string());
                }
                if field.is_percentage() && (range.min < 0.0 || range.max > 100.0) {
                    return Err("Percentage must be between 0 and 100".to_string());
                }
            }
            ConditionValue::Text(text) => {
                if text.trim().is_empty() {
                    return Err(format!("Field '{}' requires a value", field));
                }
                let options = field.options();
                if !options.is_empty() && !options.contains(&text.as_str()) {
                    return Err(format!("Invalid value '{}' for field '{}'", text, field));
                }
            }
            ConditionValue::Places(places) if places.is_empty() => {
                return Err(format!("Field '{}' requires at least one name", field));
            }
            ConditionValue::Groups(groups) if groups.is_empty() => {
                return Err("At least one group is required".to_string());
            }
            ConditionValue::Radius(geo) => {
                if !(-90.0..=90.0).contains(&geo.lat) || !(-180.0..=180.0).contains(&geo.lng) {
                    return Err("Coordinates are out of range".to_string());
                }
                if !(geo.radius_km > 0.0) || !geo.radius_km.is_finite() {
                    return Err("Radius must be a positive number of kilometres".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Convert a raw JSON operand into the shape `kind` requires.
    pub(crate) fn from_json(
        field: SegmentField,
        kind: ValueKind,
        raw: &JsonValue,
    ) -> Result<Self, String> {
        let value = match kind {
            ValueKind::Absent => ConditionValue::Absent,
            ValueKind::Text => ConditionValue::Text(
                scalar_text(raw).ok_or_else(|| format!("Field '{}' requires a value", field))?,
            ),
            ValueKind::Number => ConditionValue::Number(
                number(raw).ok_or_else(|| format!("Field '{}' requires a numeric value", field))?,
            ),
            ValueKind::Range => {
                let bounds = raw
                    .as_array()
                    .filter(|items| items.len() >= 2)
                    .and_then(|items| Some((number(&items[0])?, number(&items[1])?)))
                    .ok_or_else(|| {
                        format!("Field '{}' requires a [min, max] pair for 'between'", field)
                    })?;
                ConditionValue::Range(NumberRange {
                    min: bounds.0,
                    max: bounds.1,
                })
            }
            ValueKind::Days => {
                let days = number(raw)
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
                    .ok_or_else(|| format!("Field '{}' requires a whole number of days", field))?;
                ConditionValue::Days(days as u32)
            }
            ValueKind::Never => match scalar_text(raw).as_deref() {
                Some("never") => ConditionValue::Never,
                _ => return Err(format!("Field '{}' only supports equals \"never\"", field)),
            },
            ValueKind::Date => {
                let text =
                    scalar_text(raw).ok_or_else(|| format!("Field '{}' requires a date", field))?;
                let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map_err(|_| format!("Invalid date '{}' for field '{}'", text, field))?;
                ConditionValue::Date(date)
            }
            ValueKind::Flag => ConditionValue::Flag(
                flag(raw).ok_or_else(|| format!("Field '{}' requires yes or no", field))?,
            ),
            ValueKind::Activity => {
                let text = scalar_text(raw).unwrap_or_default();
                ConditionValue::Activity(
                    ActivityTier::parse(&text)
                        .ok_or_else(|| format!("Invalid value '{}' for field '{}'", text, field))?,
                )
            }
            ValueKind::Rank => {
                let text = scalar_text(raw).unwrap_or_default();
                ConditionValue::Rank(
                    RankBand::parse(&text)
                        .ok_or_else(|| format!("Invalid value '{}' for field '{}'", text, field))?,
                )
            }
            ValueKind::Engagement => {
                let text = scalar_text(raw).unwrap_or_default();
                ConditionValue::Engagement(
                    EngagementTier::parse(&text)
                        .ok_or_else(|| format!("Invalid value '{}' for field '{}'", text, field))?,
                )
            }
            ValueKind::Places => {
                let names: Vec<String> = match raw {
                    JsonValue::Array(items) => items.iter().filter_map(scalar_text).collect(),
                    // A single string may hold a comma-separated list of towns
                    JsonValue::String(text) => text.split(',').map(str::to_string).collect(),
                    _ => Vec::new(),
                };
                ConditionValue::places(names)
            }
            ValueKind::Groups => {
                let ids: BTreeSet<GroupId> = match raw {
                    JsonValue::Array(items) => items.iter().filter_map(group_id).collect(),
                    other => group_id(other).into_iter().collect(),
                };
                ConditionValue::Groups(ids)
            }
            ValueKind::Radius => {
                let object = raw.as_object().ok_or_else(|| {
                    "Geographic condition requires lat, lng and radius_km".to_string()
                })?;
                let get = |key: &str| object.get(key).and_then(number);
                match (get("lat"), get("lng"), get("radius_km")) {
                    (Some(lat), Some(lng), Some(radius_km)) => {
                        ConditionValue::Radius(GeoRadius { lat, lng, radius_km })
                    }
                    _ => {
                        return Err(
                            "Geographic condition requires lat, lng and radius_km".to_string()
                        )
                    }
                }
            }
        };

        value.check(field)?;
        Ok(value)
    }

    /// Raw JSON form, the inverse of [`ConditionValue::from_json`]
    pub fn to_json(&self) -> JsonValue {
        match self {
            ConditionValue::Absent => JsonValue::Null,
            ConditionValue::Text(text) => json!(text),
            ConditionValue::Number(n) => json!(n),
            ConditionValue::Range(range) => json!([range.min, range.max]),
            ConditionValue::Days(days) => json!(days),
            ConditionValue::Never => json!("never"),
            ConditionValue::Date(date) => json!(date.format("%Y-%m-%d").to_string()),
            ConditionValue::Flag(flag) => json!(flag),
            ConditionValue::Activity(tier) => json!(tier.as_str()),
            ConditionValue::Rank(band) => json!(band.as_str()),
            ConditionValue::Engagement(tier) => json!(tier.as_str()),
            ConditionValue::Places(places) => json!(places),
            ConditionValue::Groups(groups) => json!(groups),
            ConditionValue::Radius(geo) => {
                json!({ "lat": geo.lat, "lng": geo.lng, "radius_km": geo.radius_km })
            }
        }
    }
}

fn scalar_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn flag(raw: &JsonValue) -> Option<bool> {
    match raw {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_i64().map(|n| n != 0),
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "yes" | "true" => Some(true),
            "0" | "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn group_id(raw: &JsonValue) -> Option<GroupId> {
    match raw {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse::<GroupId>().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}
