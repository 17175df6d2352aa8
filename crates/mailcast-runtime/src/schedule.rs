//! Next-run computation for recurring campaigns
//!
//! Stateless and side-effect free: the same inputs always give the same
//! answer, so re-running the scheduler after a crash is safe. Biweekly
//! cadence is anchored on the last successful send, which the caller passes
//! in explicitly.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use mailcast_core::{DayOfMonth, Frequency, RecurrenceSpec};

/// Computes recurring run times
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleCalculator;

impl ScheduleCalculator {
    /// First occurrence strictly after `after`, or `None` once past the end date
    pub fn next_run(
        spec: &RecurrenceSpec,
        after: DateTime<Utc>,
        last_sent: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let candidate = match spec.frequency {
            Frequency::Daily => Some(daily_after(spec, after)),
            Frequency::Weekly => spec.weekday().map(|day| weekly_after(spec, day, after)),
            Frequency::Biweekly => spec.weekday().map(|day| match last_sent {
                Some(last) => {
                    let mut next = weekly_after(spec, day, last) + Duration::days(7);
                    while next <= after {
                        next += Duration::days(14);
                    }
                    next
                }
                None => weekly_after(spec, day, after),
            }),
            Frequency::Monthly => spec
                .day_of_month
                .and_then(|day| monthly_after(spec, day, after)),
        }?;

        match spec.end_date {
            Some(end) if candidate.date_naive() > end => None,
            _ => Some(candidate),
        }
    }
}

fn at_time(spec: &RecurrenceSpec, date: NaiveDate) -> DateTime<Utc> {
    date.and_time(spec.time).and_utc()
}

fn daily_after(spec: &RecurrenceSpec, after: DateTime<Utc>) -> DateTime<Utc> {
    let today = at_time(spec, after.date_naive());
    if today > after {
        today
    } else {
        today + Duration::days(1)
    }
}

fn weekly_after(spec: &RecurrenceSpec, day: Weekday, after: DateTime<Utc>) -> DateTime<Utc> {
    let date = after.date_naive();
    let ahead = (i64::from(day.num_days_from_monday())
        - i64::from(date.weekday().num_days_from_monday()))
    .rem_euclid(7);
    let candidate = at_time(spec, date + Duration::days(ahead));
    if candidate > after {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

fn monthly_after(
    spec: &RecurrenceSpec,
    day: DayOfMonth,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let (year, month) = (after.year(), after.month());
    let this_month = in_month(spec, day, year, month)?;
    if this_month > after {
        return Some(this_month);
    }
    let (year, month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    in_month(spec, day, year, month)
}

fn in_month(
    spec: &RecurrenceSpec,
    day: DayOfMonth,
    year: i32,
    month: u32,
) -> Option<DateTime<Utc>> {
    let days = days_in_month(year, month)?;
    let date = NaiveDate::from_ymd_opt(year, month, day.resolve(days))?;
    Some(at_time(spec, date))
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}
