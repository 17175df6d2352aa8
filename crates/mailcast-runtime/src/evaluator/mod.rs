//! Rule evaluation
//!
//! [`RuleEvaluator`] tests one condition against one member. It is a pure
//! function of the condition, the member and the evaluation clock, so it can
//! be run from any number of threads.
//!
//! Evaluation fails closed: a condition that cannot be applied to a member
//! (an operator/value combination the field does not understand) is logged as
//! a [`DataQualityFault`] and treated as a non-match. It never surfaces as an
//! error in the audience pipeline.

mod comparison;
pub mod geo;
mod membership;
mod text;

pub(crate) use membership::place_matches;

use chrono::{DateTime, Utc};
use mailcast_core::{
    ActivityTier, Condition, ConditionOperator, ConditionValue, Member, SegmentField,
};
use thiserror::Error;

/// A condition that could not be applied to a member
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataQualityFault {
    #[error("operator '{operator}' cannot compare field '{field}' with {value:?}")]
    Unsupported {
        field: SegmentField,
        operator: ConditionOperator,
        value: ConditionValue,
    },
}

impl DataQualityFault {
    pub(crate) fn unsupported(
        field: SegmentField,
        operator: ConditionOperator,
        value: &ConditionValue,
    ) -> Self {
        DataQualityFault::Unsupported {
            field,
            operator,
            value: value.clone(),
        }
    }
}

/// Clock and options for one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationContext {
    /// Reference time for `*_than_days` and login recency
    pub now: DateTime<Utc>,
}

impl EvaluationContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// Evaluates single conditions against members
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator {
    context: EvaluationContext,
}

impl RuleEvaluator {
    pub fn new(context: EvaluationContext) -> Self {
        Self { context }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self::new(EvaluationContext::new(now))
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    /// Evaluate, failing closed on data-quality faults
    pub fn evaluate(&self, condition: &Condition, member: &Member) -> bool {
        match self.try_evaluate(condition, member) {
            Ok(matched) => matched,
            Err(fault) => {
                tracing::warn!(
                    member_id = member.id,
                    field = %condition.field(),
                    operator = %condition.operator(),
                    "Data quality fault, treating as non-match: {}",
                    fault
                );
                false
            }
        }
    }

    /// Evaluate, reporting faults to the caller
    pub fn try_evaluate(
        &self,
        condition: &Condition,
        member: &Member,
    ) -> Result<bool, DataQualityFault> {
        let field = condition.field();
        let op = condition.operator();
        let value = condition.value();
        let now = self.context.now;

        match field {
            SegmentField::Role => exact(field, &member.role, op, value),
            SegmentField::ProfileType => exact(field, &member.profile_type, op, value),
            SegmentField::Location => {
                text::compare_text(field, member.location.as_deref(), op, value)
            }
            SegmentField::Bio => text::compare_text(field, member.bio.as_deref(), op, value),
            SegmentField::Avatar => {
                text::compare_text(field, member.avatar_url.as_deref(), op, value)
            }
            SegmentField::County => membership::compare_places(
                field,
                member.county.as_deref(),
                member.location.as_deref(),
                op,
                value,
            ),
            SegmentField::Town => membership::compare_places(
                field,
                member.town.as_deref(),
                member.location.as_deref(),
                op,
                value,
            ),
            SegmentField::GeoRadius => match (op, value) {
                (ConditionOperator::Within, ConditionValue::Radius(area)) => {
                    Ok(geo::within(member.coordinates, area))
                }
                _ => Err(DataQualityFault::unsupported(field, op, value)),
            },
            SegmentField::GroupMembership => {
                membership::compare_groups(field, &member.groups, op, value)
            }
            SegmentField::CreatedAt => match (op, value) {
                (ConditionOperator::Before, ConditionValue::Date(date)) => {
                    Ok(member.created_at.date_naive() < *date)
                }
                (ConditionOperator::After, ConditionValue::Date(date)) => {
                    Ok(member.created_at.date_naive() > *date)
                }
                _ => comparison::compare_elapsed(field, member.days_since_joined(now), op, value),
            },
            SegmentField::HasListings => match (op, value) {
                (ConditionOperator::Equals, ConditionValue::Flag(flag)) => {
                    Ok((member.listing_count > 0) == *flag)
                }
                _ => Err(DataQualityFault::unsupported(field, op, value)),
            },
            SegmentField::ListingCount => {
                comparison::compare_number(field, f64::from(member.listing_count), op, value)
            }
            SegmentField::ActivityScore => match (op, value) {
                (ConditionOperator::Equals, ConditionValue::Activity(tier)) => {
                    Ok(activity_tier(member, now) == *tier)
                }
                (ConditionOperator::NotEquals, ConditionValue::Activity(tier)) => {
                    Ok(activity_tier(member, now) != *tier)
                }
                _ => Err(DataQualityFault::unsupported(field, op, value)),
            },
            SegmentField::LoginRecency => match (op, value) {
                (ConditionOperator::Equals, ConditionValue::Never) => {
                    Ok(member.last_login_at.is_none())
                }
                _ => comparison::compare_elapsed(field, member.days_since_login(now), op, value),
            },
            SegmentField::TransactionCount => {
                comparison::compare_number(field, f64::from(member.transaction_count), op, value)
            }
            SegmentField::CommunityRank => match (op, value) {
                // Members without a computed rank are in no band
                (ConditionOperator::Equals, ConditionValue::Rank(band)) => Ok(member
                    .community_rank_percentile
                    .is_some_and(|percentile| band.contains(percentile))),
                _ => Err(DataQualityFault::unsupported(field, op, value)),
            },
            SegmentField::EmailOpenRate => {
                comparison::compare_number(field, member.email_engagement.open_rate, op, value)
            }
            SegmentField::EmailClickRate => {
                comparison::compare_number(field, member.email_engagement.click_rate, op, value)
            }
            SegmentField::NewslettersReceived => comparison::compare_number(
                field,
                f64::from(member.email_engagement.newsletters_received),
                op,
                value,
            ),
            SegmentField::EmailEngagementLevel => {
                let tier = member.email_engagement.tier();
                match (op, value) {
                    (ConditionOperator::Equals, ConditionValue::Engagement(expected)) => {
                        Ok(tier == *expected)
                    }
                    (ConditionOperator::NotEquals, ConditionValue::Engagement(expected)) => {
                        Ok(tier != *expected)
                    }
                    _ => Err(DataQualityFault::unsupported(field, op, value)),
                }
            }
        }
    }
}

/// Exact match against an enumerated attribute
fn exact(
    field: SegmentField,
    actual: &str,
    op: ConditionOperator,
    value: &ConditionValue,
) -> Result<bool, DataQualityFault> {
    match (op, value) {
        (ConditionOperator::Equals, ConditionValue::Text(expected)) => Ok(actual == expected),
        (ConditionOperator::NotEquals, ConditionValue::Text(expected)) => Ok(actual != expected),
        _ => Err(DataQualityFault::unsupported(field, op, value)),
    }
}

/// Activity tier of a member: the platform's value when present, otherwise
/// derived from days since the last login (falling back to the join date).
pub fn activity_tier(member: &Member, now: DateTime<Utc>) -> ActivityTier {
    if let Some(tier) = member.activity_tier {
        return tier;
    }
    if member.last_login_at.is_none() {
        return ActivityTier::Low;
    }
    match member.days_since_login(now) {
        days if days <= 7 => ActivityTier::High,
        days if days <= 30 => ActivityTier::Medium,
        _ => ActivityTier::Low,
    }
}
