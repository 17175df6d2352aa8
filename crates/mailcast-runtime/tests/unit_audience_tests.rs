//! Audience resolution properties across targeting combinations

mod common;

use common::{members, now};
use mailcast_core::{
    AudienceSnapshot, Campaign, Condition, ConditionOperator, ConditionValue, Segment,
    SegmentField, SegmentRules, Subscriber, SuppressionEntry, SuppressionReason, TargetAudience,
};
use mailcast_runtime::{AudienceResolver, RuleEvaluator, SegmentResolver, SuppressionSnapshot};

fn resolver() -> AudienceResolver {
    AudienceResolver::new(SegmentResolver::new(RuleEvaluator::at(now())))
}

fn parallel_resolver() -> AudienceResolver {
    AudienceResolver::new(
        SegmentResolver::new(RuleEvaluator::at(now()))
            .with_parallelism(4)
            .with_parallel_threshold(10),
    )
}

fn cork_segment() -> Segment {
    let condition = Condition::new(
        SegmentField::County,
        ConditionOperator::In,
        ConditionValue::places(["Cork"]),
    )
    .unwrap();
    Segment::new(3, "Cork", SegmentRules::all(vec![condition]))
}

fn snapshot() -> AudienceSnapshot {
    AudienceSnapshot::new(now(), members(1000)).with_subscribers(vec![
        Subscriber::new("member5@example.ie").linked_to(5),
        Subscriber::new("outside@example.ie"),
    ])
}

fn suppression(ids: &[u64]) -> SuppressionSnapshot {
    SuppressionSnapshot::from_entries(
        ids.iter().map(|id| {
            SuppressionEntry::suppressed(
                &format!("member{}@example.ie", id),
                SuppressionReason::HardBounce,
                now(),
            )
        }),
        now(),
    )
}

#[test]
fn test_segment_scenario_returns_195() {
    let campaign = Campaign::draft(1, "News", "x", now()).with_segment(3);
    let audience = resolver()
        .resolve(
            &campaign,
            &snapshot(),
            Some(&cork_segment()),
            &suppression(&[5, 10, 15, 20, 25]),
        )
        .unwrap();
    assert_eq!(audience.len(), 195);
    assert_eq!(audience.suppressed_excluded, 5);
}

#[test]
fn test_suppressed_never_included_in_any_combination() {
    let suppressed = suppression(&[5, 7, 500, 1000]);
    let blocked = ["member5@example.ie", "member7@example.ie", "member500@example.ie", "member1000@example.ie"];

    for audience in [
        TargetAudience::AllMembers,
        TargetAudience::SubscribersOnly,
        TargetAudience::Both,
    ] {
        for with_segment in [false, true] {
            let mut campaign = Campaign::draft(1, "News", "x", now()).with_audience(audience);
            if with_segment {
                campaign = campaign.with_segment(3);
            }
            let segment = cork_segment();
            let result = resolver()
                .resolve(&campaign, &snapshot(), Some(&segment), &suppressed)
                .unwrap();
            assert!(
                result.emails().all(|email| !blocked.contains(&email)),
                "{:?} segment={} leaked a suppressed address",
                audience,
                with_segment
            );
        }
    }
}

#[test]
fn test_resolution_is_reproducible_and_parallel_safe() {
    let campaign = Campaign::draft(1, "News", "x", now())
        .with_audience(TargetAudience::Both)
        .with_segment(3);
    let segment = cork_segment();
    let suppressed = suppression(&[10]);

    let first = resolver()
        .resolve(&campaign, &snapshot(), Some(&segment), &suppressed)
        .unwrap();
    let second = resolver()
        .resolve(&campaign, &snapshot(), Some(&segment), &suppressed)
        .unwrap();
    let threaded = parallel_resolver()
        .resolve(&campaign, &snapshot(), Some(&segment), &suppressed)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, threaded);
    assert_eq!(
        resolver()
            .preview_count(&campaign, &snapshot(), Some(&segment), &suppressed)
            .unwrap(),
        first.len()
    );
}

#[test]
fn test_empty_segment_keeps_base_pool() {
    let campaign = Campaign::draft(1, "News", "x", now()).with_segment(4);
    let everyone = Segment::new(4, "Everyone", SegmentRules::default());
    let audience = resolver()
        .resolve(
            &campaign,
            &snapshot(),
            Some(&everyone),
            &SuppressionSnapshot::empty(now()),
        )
        .unwrap();
    assert_eq!(audience.len(), 1000);
}
