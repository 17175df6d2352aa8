//! Unit tests for campaign lifecycle and recurrence types

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use mailcast_core::campaign::*;
use mailcast_core::{CoreError, Variant};

fn created() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

#[test]
fn test_status_transition_table() {
    use CampaignStatus::*;
    assert!(Draft.can_transition_to(Scheduled));
    assert!(Scheduled.can_transition_to(Sending));
    assert!(Sending.can_transition_to(Scheduled));
    assert!(!Sent.can_transition_to(Draft));
    assert!(!Sending.can_transition_to(Sending));
    assert!(!Draft.can_transition_to(Sent));
}

#[test]
fn test_failed_campaign_can_be_edited_again() {
    let mut campaign = Campaign::draft(1, "Hello", "<p>x</p>", created());
    campaign.transition(CampaignStatus::Sending).unwrap();
    campaign.transition(CampaignStatus::Failed).unwrap();
    assert!(campaign.ensure_editable().is_ok());
    campaign.transition(CampaignStatus::Draft).unwrap();
}

#[test]
fn test_campaign_yaml_with_recurrence() {
    let yaml = r#"
id: 40
subject: Weekly digest
content: "<p>digest</p>"
status: scheduled
target_audience: both
target_counties: [Cork, Kerry]
target_groups: [2]
ab_test_enabled: true
subject_b: Your weekly digest
ab_split_percentage: 20
ab_winner_metric: clicks
recurrence:
  frequency: monthly
  day_of_month: 31
  time: "08:00"
  end_date: 2025-12-31
created_at: 2025-01-01T00:00:00Z
"#;
    let campaign: Campaign = serde_yaml::from_str(yaml).unwrap();
    assert!(campaign.validate().is_ok());
    assert!(campaign.is_ab_test());
    assert_eq!(campaign.subject_for(Some(Variant::B)), "Your weekly digest");
    let recurrence = campaign.recurrence.as_ref().unwrap();
    assert_eq!(recurrence.day_of_month, Some(DayOfMonth::Day(31)));
    assert_eq!(recurrence.time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(
        recurrence.end_date,
        Some(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap())
    );
}

#[test]
fn test_split_above_hundred_is_invalid() {
    let campaign = Campaign::draft(1, "Hi", "", created()).with_ab_test(
        "Hey",
        150,
        WinnerMetric::Opens,
    );
    assert!(matches!(
        campaign.validate(),
        Err(CoreError::InvalidCampaign(_))
    ));
}

#[test]
fn test_biweekly_without_day_cannot_be_scheduled() {
    let mut spec = RecurrenceSpec::biweekly(
        RecurringDay::Friday,
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    );
    spec.day = None;
    let campaign = Campaign::draft(1, "Hi", "", created()).with_recurrence(spec);
    let err = campaign.validate().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Scheduling error: biweekly recurrence requires a day of the week"
    );
}
