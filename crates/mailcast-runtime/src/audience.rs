//! Audience resolution
//!
//! Turns a campaign's targeting into the ordered list of recipients:
//!
//! 1. base pool from `target_audience` (members, subscribers, or both)
//! 2. intersect with the campaign segment, if any
//! 3. intersect with target counties, towns and groups (each narrows further)
//! 4. subtract every suppressed address, unconditionally
//! 5. order by member id, then external subscribers by email
//!
//! Resolution is a pure function of the snapshot, the segment and the
//! suppression snapshot; previews and real sends call the same code.

use crate::error::{Result, RuntimeError};
use crate::evaluator::place_matches;
use crate::segment::SegmentResolver;
use crate::suppression::SuppressionSnapshot;
use mailcast_core::{
    normalize_email, AudienceSnapshot, Campaign, GroupId, Member, MemberId, Recipient, Segment,
    TargetAudience,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Final recipient list of a campaign
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Audience {
    pub recipients: Vec<Recipient>,
    /// Addresses that matched the targeting but were removed as suppressed
    pub suppressed_excluded: usize,
}

impl Audience {
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.recipients.iter().map(|r| r.email.as_str())
    }
}

/// Candidate recipient together with the member record used for targeting
struct Candidate<'a> {
    recipient: Recipient,
    member: Option<&'a Member>,
}

/// Resolves campaign audiences
#[derive(Debug, Clone)]
pub struct AudienceResolver {
    segments: SegmentResolver,
}

impl AudienceResolver {
    pub fn new(segments: SegmentResolver) -> Self {
        Self { segments }
    }

    pub fn segment_resolver(&self) -> &SegmentResolver {
        &self.segments
    }

    /// Resolve the recipients of `campaign`.
    ///
    /// `segment` must be the segment named by `campaign.segment_id` when one
    /// is set.
    pub fn resolve(
        &self,
        campaign: &Campaign,
        snapshot: &AudienceSnapshot,
        segment: Option<&Segment>,
        suppression: &SuppressionSnapshot,
    ) -> Result<Audience> {
        let segment = match campaign.segment_id {
            Some(id) => match segment {
                Some(segment) if segment.id == id => Some(segment),
                _ => return Err(RuntimeError::SegmentNotFound(id)),
            },
            None => None,
        };

        let mut candidates = base_pool(campaign.target_audience, snapshot);

        if let Some(segment) = segment {
            let linked: Vec<Member> = candidates
                .iter()
                .filter_map(|c| c.member.cloned())
                .collect();
            let matched = self.segments.resolve(segment, &linked);
            candidates.retain(|c| c.member.is_some_and(|m| matched.contains(&m.id)));
        }

        apply_filters(campaign, &mut candidates);

        let before = candidates.len();
        candidates.retain(|c| !suppression.is_suppressed(&c.recipient.email));
        let suppressed_excluded = before - candidates.len();

        let recipients = order(candidates);
        tracing::debug!(
            campaign_id = campaign.id,
            recipients = recipients.len(),
            suppressed_excluded,
            "Resolved audience"
        );

        Ok(Audience {
            recipients,
            suppressed_excluded,
        })
    }

    /// Recipient count only; identical logic to [`AudienceResolver::resolve`]
    pub fn preview_count(
        &self,
        campaign: &Campaign,
        snapshot: &AudienceSnapshot,
        segment: Option<&Segment>,
        suppression: &SuppressionSnapshot,
    ) -> Result<usize> {
        self.resolve(campaign, snapshot, segment, suppression)
            .map(|audience| audience.len())
    }

    /// Filter an explicit recipient list through the suppression snapshot,
    /// keeping its order and dropping duplicate addresses.
    pub fn restrict(&self, recipients: Vec<Recipient>, suppression: &SuppressionSnapshot) -> Audience {
        let mut seen = HashSet::new();
        let mut suppressed_excluded = 0;
        let recipients = recipients
            .into_iter()
            .filter(|r| seen.insert(r.email.clone()))
            .filter(|r| {
                let blocked = suppression.is_suppressed(&r.email);
                if blocked {
                    suppressed_excluded += 1;
                }
                !blocked
            })
            .collect();
        Audience {
            recipients,
            suppressed_excluded,
        }
    }
}

fn base_pool(audience: TargetAudience, snapshot: &AudienceSnapshot) -> Vec<Candidate<'_>> {
    let by_id: HashMap<MemberId, &Member> =
        snapshot.members.iter().map(|m| (m.id, m)).collect();

    let members = || {
        snapshot
            .members
            .iter()
            .filter(|m| m.is_mailable())
            .filter_map(|m| {
                m.recipient().map(|recipient| Candidate {
                    recipient,
                    member: Some(m),
                })
            })
    };
    let subscribers = || {
        snapshot
            .subscribers
            .iter()
            .filter(|s| s.is_active && !normalize_email(&s.email).is_empty())
            .map(|s| {
                // Only approved accounts lend their attributes to targeting
                let member = s
                    .member_id
                    .and_then(|id| by_id.get(&id).copied())
                    .filter(|m| m.is_approved);
                let mut recipient = Recipient::new(&s.email, member.map(|m| m.id));
                recipient.name = s.name.clone().or_else(|| member.and_then(|m| m.name.clone()));
                Candidate { recipient, member }
            })
    };

    let mut seen_ids = HashSet::new();
    let mut seen_emails = HashSet::new();
    let mut keep = |c: &Candidate| {
        let new_id = c.member.map_or(true, |m| seen_ids.insert(m.id));
        new_id && seen_emails.insert(c.recipient.email.clone())
    };

    match audience {
        TargetAudience::AllMembers => members().filter(|c| keep(c)).collect(),
        TargetAudience::SubscribersOnly => subscribers().filter(|c| keep(c)).collect(),
        TargetAudience::Both => members().chain(subscribers()).filter(|c| keep(c)).collect(),
    }
}

fn fold_names(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// County, town and group filters. Each non-empty filter narrows the pool;
/// candidates without a member record cannot satisfy any of them.
fn apply_filters(campaign: &Campaign, candidates: &mut Vec<Candidate<'_>>) {
    let counties = fold_names(&campaign.target_counties);
    let towns = fold_names(&campaign.target_towns);
    let groups: BTreeSet<GroupId> = campaign.target_groups.iter().copied().collect();

    if !counties.is_empty() {
        candidates.retain(|c| {
            c.member.is_some_and(|m| {
                place_matches(m.county.as_deref(), m.location.as_deref(), &counties)
            })
        });
    }
    if !towns.is_empty() {
        candidates.retain(|c| {
            c.member
                .is_some_and(|m| place_matches(m.town.as_deref(), m.location.as_deref(), &towns))
        });
    }
    if !groups.is_empty() {
        candidates.retain(|c| c.member.is_some_and(|m| !m.groups.is_disjoint(&groups)));
    }
}

/// Member-linked recipients by member id, then the rest by email
fn order(candidates: Vec<Candidate<'_>>) -> Vec<Recipient> {
    let mut recipients: Vec<Recipient> = candidates.into_iter().map(|c| c.recipient).collect();
    recipients.sort_by(|a, b| match (a.member_id, b.member_id) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.email.cmp(&b.email)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.email.cmp(&b.email),
    });
    recipients
}
