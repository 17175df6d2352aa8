//! Segment resolution
//!
//! Combines a segment's conditions with ALL/ANY semantics. Large member sets
//! are split into chunks evaluated on scoped threads; results are merged into
//! an ordered set so the output never depends on scheduling.

use crate::evaluator::RuleEvaluator;
use mailcast_core::{MatchType, Member, MemberId, Segment, SegmentRules};
use std::collections::BTreeSet;

/// Member count below which resolution stays on the calling thread
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2048;

/// Resolves segments to member id sets
#[derive(Debug, Clone)]
pub struct SegmentResolver {
    evaluator: RuleEvaluator,
    parallelism: usize,
    parallel_threshold: usize,
}

impl SegmentResolver {
    pub fn new(evaluator: RuleEvaluator) -> Self {
        Self {
            evaluator,
            parallelism: 1,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Number of threads used for large member sets (1 disables threading)
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// Whether one member satisfies a rule set. No conditions means no filter.
    pub fn matches(&self, rules: &SegmentRules, member: &Member) -> bool {
        if rules.conditions.is_empty() {
            return true;
        }
        match rules.match_type {
            MatchType::All => rules
                .conditions
                .iter()
                .all(|condition| self.evaluator.evaluate(condition, member)),
            MatchType::Any => rules
                .conditions
                .iter()
                .any(|condition| self.evaluator.evaluate(condition, member)),
        }
    }

    pub fn resolve(&self, segment: &Segment, members: &[Member]) -> BTreeSet<MemberId> {
        self.resolve_rules(&segment.rules, members)
    }

    /// Ids of the members satisfying `rules`
    pub fn resolve_rules(&self, rules: &SegmentRules, members: &[Member]) -> BTreeSet<MemberId> {
        if rules.conditions.is_empty() {
            return members.iter().map(|member| member.id).collect();
        }

        if self.parallelism <= 1 || members.len() < self.parallel_threshold {
            return self.resolve_chunk(rules, members).into_iter().collect();
        }

        let chunk_size = members.len().div_ceil(self.parallelism);
        let mut resolved = BTreeSet::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = members
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || self.resolve_chunk(rules, chunk)))
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(ids) => resolved.extend(ids),
                    // A panicking chunk contributes nobody
                    Err(_) => tracing::error!("Segment evaluation thread panicked"),
                }
            }
        });
        resolved
    }

    fn resolve_chunk(&self, rules: &SegmentRules, members: &[Member]) -> Vec<MemberId> {
        members
            .iter()
            .filter(|member| self.matches(rules, member))
            .map(|member| member.id)
            .collect()
    }
}
