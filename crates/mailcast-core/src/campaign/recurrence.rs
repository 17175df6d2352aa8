//! Recurrence specs for repeating campaigns
//!
//! All times are UTC. `time` is a wall-clock time of day, `end_date` is
//! inclusive: a run on the end date itself is still allowed.

use crate::error::{CoreError, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// How often a recurring campaign repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day of the week for weekly and biweekly campaigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringDay {
    #[serde(alias = "mon")]
    Monday,
    #[serde(alias = "tue")]
    Tuesday,
    #[serde(alias = "wed")]
    Wednesday,
    #[serde(alias = "thu")]
    Thursday,
    #[serde(alias = "fri")]
    Friday,
    #[serde(alias = "sat")]
    Saturday,
    #[serde(alias = "sun")]
    Sunday,
}

impl RecurringDay {
    pub fn weekday(&self) -> Weekday {
        match self {
            RecurringDay::Monday => Weekday::Mon,
            RecurringDay::Tuesday => Weekday::Tue,
            RecurringDay::Wednesday => Weekday::Wed,
            RecurringDay::Thursday => Weekday::Thu,
            RecurringDay::Friday => Weekday::Fri,
            RecurringDay::Saturday => Weekday::Sat,
            RecurringDay::Sunday => Weekday::Sun,
        }
    }
}

impl From<Weekday> for RecurringDay {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => RecurringDay::Monday,
            Weekday::Tue => RecurringDay::Tuesday,
            Weekday::Wed => RecurringDay::Wednesday,
            Weekday::Thu => RecurringDay::Thursday,
            Weekday::Fri => RecurringDay::Friday,
            Weekday::Sat => RecurringDay::Saturday,
            Weekday::Sun => RecurringDay::Sunday,
        }
    }
}

/// Day of the month for monthly campaigns
///
/// Days past the end of a short month are clamped to its last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayOfMonth {
    Day(u32),
    Last,
}

impl DayOfMonth {
    /// Concrete day within a month that has `days_in_month` days
    pub fn resolve(&self, days_in_month: u32) -> u32 {
        match self {
            DayOfMonth::Day(day) => (*day).clamp(1, days_in_month),
            DayOfMonth::Last => days_in_month,
        }
    }
}

impl fmt::Display for DayOfMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOfMonth::Day(day) => write!(f, "{}", day),
            DayOfMonth::Last => f.write_str("last"),
        }
    }
}

impl Serialize for DayOfMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DayOfMonth::Day(day) => serializer.serialize_u32(*day),
            DayOfMonth::Last => serializer.serialize_str("last"),
        }
    }
}

impl<'de> Deserialize<'de> for DayOfMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DayVisitor;

        impl<'de> Visitor<'de> for DayVisitor {
            type Value = DayOfMonth;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a day of month (1-31) or \"last\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<DayOfMonth, E> {
                if (1..=31).contains(&value) {
                    Ok(DayOfMonth::Day(value as u32))
                } else {
                    Err(E::custom(format!("day of month out of range: {}", value)))
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<DayOfMonth, E> {
                if value < 0 {
                    return Err(E::custom(format!("day of month out of range: {}", value)));
                }
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<DayOfMonth, E> {
                let value = value.trim();
                if value.eq_ignore_ascii_case("last") {
                    return Ok(DayOfMonth::Last);
                }
                let day = value
                    .parse::<u64>()
                    .map_err(|_| E::custom(format!("invalid day of month: {}", value)))?;
                self.visit_u64(day)
            }
        }

        deserializer.deserialize_any(DayVisitor)
    }
}

/// `HH:MM` serde for recurring send times
pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Accepts `HH:MM` and `HH:MM:SS`
    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| format!("invalid time of day '{}', expected HH:MM", raw))
    }
}

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Repeat schedule of a recurring campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub frequency: Frequency,
    /// Required for weekly and biweekly
    #[serde(default)]
    pub day: Option<RecurringDay>,
    /// Required for monthly
    #[serde(default)]
    pub day_of_month: Option<DayOfMonth>,
    #[serde(with = "hh_mm", default = "default_time")]
    pub time: NaiveTime,
    /// Inclusive last date on which a run may happen
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RecurrenceSpec {
    pub fn daily(time: NaiveTime) -> Self {
        Self {
            frequency: Frequency::Daily,
            day: None,
            day_of_month: None,
            time,
            end_date: None,
        }
    }

    pub fn weekly(day: RecurringDay, time: NaiveTime) -> Self {
        Self {
            frequency: Frequency::Weekly,
            day: Some(day),
            ..Self::daily(time)
        }
    }

    pub fn biweekly(day: RecurringDay, time: NaiveTime) -> Self {
        Self {
            frequency: Frequency::Biweekly,
            ..Self::weekly(day, time)
        }
    }

    pub fn monthly(day_of_month: DayOfMonth, time: NaiveTime) -> Self {
        Self {
            frequency: Frequency::Monthly,
            day_of_month: Some(day_of_month),
            ..Self::daily(time)
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Reject incomplete specs instead of defaulting the missing parts
    pub fn validate(&self) -> Result<()> {
        match self.frequency {
            Frequency::Weekly | Frequency::Biweekly if self.day.is_none() => {
                Err(CoreError::Scheduling(format!(
                    "{} recurrence requires a day of the week",
                    self.frequency
                )))
            }
            Frequency::Monthly => match self.day_of_month {
                None => Err(CoreError::Scheduling(
                    "monthly recurrence requires a day of the month".to_string(),
                )),
                Some(DayOfMonth::Day(day)) if !(1..=31).contains(&day) => Err(
                    CoreError::Scheduling(format!("day of month out of range: {}", day)),
                ),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Weekday for weekly cadences
    pub fn weekday(&self) -> Option<Weekday> {
        self.day.map(|day| day.weekday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_validate_requires_day_for_weekly() {
        let mut spec = RecurrenceSpec::weekly(RecurringDay::Monday, nine());
        assert!(spec.validate().is_ok());
        spec.day = None;
        assert!(matches!(spec.validate(), Err(CoreError::Scheduling(_))));
    }

    #[test]
    fn test_validate_requires_day_of_month_for_monthly() {
        let mut spec = RecurrenceSpec::monthly(DayOfMonth::Last, nine());
        assert!(spec.validate().is_ok());
        spec.day_of_month = None;
        let err = spec.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Scheduling error: monthly recurrence requires a day of the month"
        );
        spec.day_of_month = Some(DayOfMonth::Day(32));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_day_of_month_resolve_clamps() {
        assert_eq!(DayOfMonth::Day(31).resolve(28), 28);
        assert_eq!(DayOfMonth::Day(15).resolve(28), 15);
        assert_eq!(DayOfMonth::Last.resolve(30), 30);
    }

    #[test]
    fn test_spec_deserialize_form_values() {
        let spec: RecurrenceSpec = serde_json::from_str(
            r#"{"frequency": "monthly", "day_of_month": "last", "time": "18:30", "end_date": "2025-12-31"}"#,
        )
        .unwrap();
        assert_eq!(spec.day_of_month, Some(DayOfMonth::Last));
        assert_eq!(spec.time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());

        let spec: RecurrenceSpec =
            serde_json::from_str(r#"{"frequency": "weekly", "day": "tue", "day_of_month": "15"}"#)
                .unwrap();
        assert_eq!(spec.day, Some(RecurringDay::Tuesday));
        assert_eq!(spec.day_of_month, Some(DayOfMonth::Day(15)));
        assert_eq!(spec.time, nine());

        assert!(serde_json::from_str::<RecurrenceSpec>(
            r#"{"frequency": "monthly", "day_of_month": 0}"#
        )
        .is_err());
    }

    #[test]
    fn test_time_serializes_as_hh_mm() {
        let spec = RecurrenceSpec::daily(NaiveTime::from_hms_opt(7, 5, 0).unwrap());
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["time"], "07:05");
        assert!(hh_mm::parse("25:00").is_err());
    }
}
