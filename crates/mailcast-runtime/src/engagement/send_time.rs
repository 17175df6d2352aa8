//! Engagement by time of day and day of week, and send-time recommendations
//!
//! Scores weight a click twice as much as an open. Below
//! [`MIN_OPENS_FOR_RECOMMENDATIONS`] opens the data is considered too thin
//! and a fixed set of sensible defaults is returned instead.

use chrono::{Datelike, Timelike, Weekday};
use mailcast_core::{EngagementEvent, EngagementKind};
use serde::Serialize;

pub const MIN_OPENS_FOR_RECOMMENDATIONS: usize = 50;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyEngagement {
    /// Hour of day, 0-23 (UTC)
    pub hour: u32,
    pub opens: usize,
    pub clicks: usize,
}

impl HourlyEngagement {
    pub fn score(&self) -> usize {
        self.opens + self.clicks * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyEngagement {
    pub day: &'static str,
    pub opens: usize,
    pub clicks: usize,
}

impl DailyEngagement {
    pub fn score(&self) -> usize {
        self.opens + self.clicks * 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendTimeRecommendation {
    pub hour: u32,
    /// 12-hour clock, e.g. `2:00 PM`
    pub time: String,
    pub label: &'static str,
    pub score: usize,
    /// Share of the total score, in percent
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimalSendTimes {
    pub has_data: bool,
    pub total_opens_analyzed: usize,
    pub recommendations: Vec<SendTimeRecommendation>,
    /// Top three days by score
    pub best_days: Vec<DailyEngagement>,
}

pub fn engagement_by_hour(events: &[EngagementEvent]) -> Vec<HourlyEngagement> {
    let mut hours: Vec<HourlyEngagement> = (0..24)
        .map(|hour| HourlyEngagement {
            hour,
            opens: 0,
            clicks: 0,
        })
        .collect();
    for event in events {
        let slot = &mut hours[event.occurred_at.hour() as usize];
        match event.kind {
            EngagementKind::Open => slot.opens += 1,
            EngagementKind::Click => slot.clicks += 1,
        }
    }
    hours
}

/// Monday first
pub fn engagement_by_weekday(events: &[EngagementEvent]) -> Vec<DailyEngagement> {
    let mut days: Vec<DailyEngagement> = WEEK
        .iter()
        .map(|day| DailyEngagement {
            day: day_name(*day),
            opens: 0,
            clicks: 0,
        })
        .collect();
    for event in events {
        let slot = &mut days[event.occurred_at.weekday().num_days_from_monday() as usize];
        match event.kind {
            EngagementKind::Open => slot.opens += 1,
            EngagementKind::Click => slot.clicks += 1,
        }
    }
    days
}

/// Best `top` hours to send, from historical engagement
pub fn optimal_send_times(events: &[EngagementEvent], top: usize) -> OptimalSendTimes {
    let total_opens = events
        .iter()
        .filter(|e| e.kind == EngagementKind::Open)
        .count();

    if total_opens < MIN_OPENS_FOR_RECOMMENDATIONS {
        return OptimalSendTimes {
            has_data: false,
            total_opens_analyzed: total_opens,
            recommendations: default_recommendations(),
            best_days: Vec::new(),
        };
    }

    let mut hours = engagement_by_hour(events);
    let total_score: usize = hours.iter().map(HourlyEngagement::score).sum();
    hours.sort_by(|a, b| b.score().cmp(&a.score()).then(a.hour.cmp(&b.hour)));

    let recommendations = hours
        .iter()
        .take(top)
        .map(|h| SendTimeRecommendation {
            hour: h.hour,
            time: clock(h.hour),
            label: time_label(h.hour),
            score: h.score(),
            percentage: if total_score == 0 {
                0.0
            } else {
                (h.score() as f64 / total_score as f64 * 1000.0).round() / 10.0
            },
            note: None,
        })
        .collect();

    let mut days = engagement_by_weekday(events);
    // Stable sort keeps Monday-first order among equal scores
    days.sort_by(|a, b| b.score().cmp(&a.score()));
    days.truncate(3);

    OptimalSendTimes {
        has_data: true,
        total_opens_analyzed: total_opens,
        recommendations,
        best_days: days,
    }
}

/// Part of the day an hour falls in
pub fn time_label(hour: u32) -> &'static str {
    match hour {
        5..=8 => "Early Morning",
        9..=11 => "Morning",
        12..=13 => "Midday",
        14..=16 => "Afternoon",
        17..=19 => "Evening",
        20..=22 => "Night",
        _ => "Late Night",
    }
}

fn clock(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:00 {}", display, suffix)
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn default_recommendations() -> Vec<SendTimeRecommendation> {
    [
        (9, "Popular time for professional emails"),
        (10, "High engagement for B2B"),
        (14, "Post-lunch peak"),
        (17, "Good for community newsletters"),
        (20, "Evening leisure reading"),
    ]
    .into_iter()
    .map(|(hour, note)| SendTimeRecommendation {
        hour,
        time: clock(hour),
        label: time_label(hour),
        score: 0,
        percentage: 0.0,
        note: Some(note),
    })
    .collect()
}
