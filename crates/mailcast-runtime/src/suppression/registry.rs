//! Registry and bounce state machine
//!
//! Per address: `clean -> (soft bounce)* -> suppressed`, or
//! `clean -> hard bounce | complaint -> suppressed` immediately. Manual
//! suppression and restore bypass the counter. Restoring deletes the entry
//! (bounce count and reason go with it) but the bounce history stays.

use super::backend::{MemoryBackend, SuppressionBackend};
use crate::error::Result;
use chrono::{DateTime, Utc};
use mailcast_core::{
    is_valid_email, normalize_email, BounceEvent, BounceType, CoreError, SuppressionEntry,
    SuppressionReason,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Soft bounces that suppress an address
pub const DEFAULT_SOFT_BOUNCE_THRESHOLD: u32 = 3;

type EntryMap = HashMap<String, SuppressionEntry>;

/// Immutable view of the registry at one instant
#[derive(Debug, Clone)]
pub struct SuppressionSnapshot {
    entries: Arc<EntryMap>,
    as_of: DateTime<Utc>,
}

impl SuppressionSnapshot {
    /// Snapshot with no suppressed addresses
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            entries: Arc::new(HashMap::new()),
            as_of,
        }
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = SuppressionEntry>,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            entries: Arc::new(
                entries
                    .into_iter()
                    .map(|entry| (normalize_email(&entry.email), entry))
                    .collect(),
            ),
            as_of,
        }
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn is_suppressed(&self, email: &str) -> bool {
        self.entries
            .get(&normalize_email(email))
            .is_some_and(|entry| entry.is_suppressed(self.as_of))
    }

    pub fn get(&self, email: &str) -> Option<&SuppressionEntry> {
        self.entries.get(&normalize_email(email))
    }

    /// Number of addresses currently suppressed
    pub fn suppressed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.is_suppressed(self.as_of))
            .count()
    }
}

/// Result of applying a bounce
#[derive(Debug, Clone, PartialEq)]
pub struct BounceOutcome {
    pub entry: SuppressionEntry,
    /// The bounce moved the address from eligible to suppressed
    pub newly_suppressed: bool,
}

/// Registry counters for the admin dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SuppressionStats {
    pub total_suppressed: usize,
    pub by_reason: BTreeMap<SuppressionReason, usize>,
    /// Addresses with soft bounces that are not (yet) suppressed
    pub soft_bounce_tracked: usize,
    /// Most recent bounces, newest first
    pub recent_events: Vec<BounceEvent>,
}

/// Suppression registry with write-through persistence
pub struct SuppressionRegistry {
    backend: Arc<dyn SuppressionBackend>,
    entries: RwLock<Arc<EntryMap>>,
    soft_bounce_threshold: u32,
}

impl SuppressionRegistry {
    /// Load the registry from a backend
    pub async fn load(backend: Arc<dyn SuppressionBackend>) -> Result<Self> {
        let entries: EntryMap = backend
            .load_all()
            .await?
            .into_iter()
            .map(|entry| (normalize_email(&entry.email), entry))
            .collect();
        tracing::info!(entries = entries.len(), "Loaded suppression registry");

        Ok(Self {
            backend,
            entries: RwLock::new(Arc::new(entries)),
            soft_bounce_threshold: DEFAULT_SOFT_BOUNCE_THRESHOLD,
        })
    }

    /// Empty registry over a memory backend
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
            entries: RwLock::new(Arc::new(HashMap::new())),
            soft_bounce_threshold: DEFAULT_SOFT_BOUNCE_THRESHOLD,
        }
    }

    pub fn with_soft_bounce_threshold(mut self, threshold: u32) -> Self {
        self.soft_bounce_threshold = threshold.max(1);
        self
    }

    pub fn soft_bounce_threshold(&self) -> u32 {
        self.soft_bounce_threshold
    }

    /// Consistent view for one resolution pass. Later writes do not affect it.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> SuppressionSnapshot {
        SuppressionSnapshot {
            entries: Arc::clone(&*self.entries.read().await),
            as_of: now,
        }
    }

    pub async fn is_suppressed(&self, email: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .read()
            .await
            .get(&normalize_email(email))
            .is_some_and(|entry| entry.is_suppressed(now))
    }

    pub async fn get(&self, email: &str) -> Option<SuppressionEntry> {
        self.entries
            .read()
            .await
            .get(&normalize_email(email))
            .cloned()
    }

    /// Apply a bounce or complaint to the state machine
    pub async fn record_bounce(&self, event: BounceEvent) -> Result<BounceOutcome> {
        let email = normalize_email(&event.email);
        let at = event.occurred_at;
        let bounce_type = event.bounce_type;

        let mut guard = self.entries.write().await;
        let mut entry = guard
            .get(&email)
            .cloned()
            .unwrap_or_else(|| SuppressionEntry::new(&email));

        if entry.reason.is_some() && entry.is_expired(at) {
            // Lapsed suppression; the address starts clean again
            entry.reason = None;
            entry.suppressed_at = None;
            entry.expires_at = None;
            entry.bounce_count = 0;
        }

        let was_suppressed = entry.is_suppressed(at);
        entry.bounce_count += 1;
        entry.last_bounce_at = Some(at);

        if !was_suppressed {
            let reason = match bounce_type {
                BounceType::Hard => Some(SuppressionReason::HardBounce),
                BounceType::Complaint => Some(SuppressionReason::Complaint),
                BounceType::Soft if entry.bounce_count >= self.soft_bounce_threshold => {
                    Some(SuppressionReason::RepeatedSoftBounce)
                }
                BounceType::Soft => None,
            };
            if reason.is_some() {
                entry.reason = reason;
                entry.suppressed_at = Some(at);
            }
        }

        let newly_suppressed = !was_suppressed && entry.reason.is_some();

        self.backend
            .append_event(BounceEvent {
                email: email.clone(),
                ..event
            })
            .await?;
        self.backend.upsert(entry.clone()).await?;
        Arc::make_mut(&mut *guard).insert(email.clone(), entry.clone());

        if newly_suppressed {
            tracing::info!(
                email = %email,
                bounce_type = bounce_type.as_str(),
                bounce_count = entry.bounce_count,
                "Address suppressed"
            );
        } else {
            tracing::debug!(
                email = %email,
                bounce_type = bounce_type.as_str(),
                bounce_count = entry.bounce_count,
                "Bounce recorded"
            );
        }

        Ok(BounceOutcome {
            entry,
            newly_suppressed,
        })
    }

    /// Suppress an address by administrator action or unsubscribe
    pub async fn suppress(
        &self,
        email: &str,
        reason: SuppressionReason,
        at: DateTime<Utc>,
    ) -> Result<SuppressionEntry> {
        self.suppress_until(email, reason, at, None).await
    }

    /// Suppress an address, optionally only until `expires_at`
    pub async fn suppress_until(
        &self,
        email: &str,
        reason: SuppressionReason,
        at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SuppressionEntry> {
        if !is_valid_email(email) {
            return Err(CoreError::InvalidEmail(email.to_string()).into());
        }
        let email = normalize_email(email);

        let mut guard = self.entries.write().await;
        let mut entry = guard
            .get(&email)
            .cloned()
            .unwrap_or_else(|| SuppressionEntry::new(&email));
        entry.reason = Some(reason);
        entry.suppressed_at = Some(at);
        entry.expires_at = expires_at;

        self.backend.upsert(entry.clone()).await?;
        Arc::make_mut(&mut *guard).insert(email.clone(), entry.clone());
        tracing::info!(email = %email, reason = %reason, "Address suppressed manually");
        Ok(entry)
    }

    /// Remove an address from the registry. Returns whether it was present.
    pub async fn restore(&self, email: &str) -> Result<bool> {
        let email = normalize_email(email);
        let mut guard = self.entries.write().await;
        if !guard.contains_key(&email) {
            return Ok(false);
        }
        self.backend.remove(&email).await?;
        Arc::make_mut(&mut *guard).remove(&email);
        tracing::info!(email = %email, "Address restored");
        Ok(true)
    }

    /// Delete suppressions whose expiry has passed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut guard = self.entries.write().await;
        let expired: Vec<String> = guard
            .values()
            .filter(|entry| entry.reason.is_some() && entry.is_expired(now))
            .map(|entry| entry.email.clone())
            .collect();

        for email in &expired {
            self.backend.remove(email).await?;
            Arc::make_mut(&mut *guard).remove(email);
        }
        if !expired.is_empty() {
            tracing::info!(purged = expired.len(), "Purged expired suppressions");
        }
        Ok(expired.len())
    }

    /// Bounce history for one address, oldest first
    pub async fn history(&self, email: &str) -> Result<Vec<BounceEvent>> {
        self.backend.events(Some(&normalize_email(email))).await
    }

    pub async fn stats(&self, now: DateTime<Utc>, recent_limit: usize) -> Result<SuppressionStats> {
        let mut stats = SuppressionStats::default();
        {
            let entries = self.entries.read().await;
            for entry in entries.values() {
                match entry.reason {
                    Some(reason) if entry.is_suppressed(now) => {
                        stats.total_suppressed += 1;
                        *stats.by_reason.entry(reason).or_insert(0) += 1;
                    }
                    None if entry.bounce_count > 0 => stats.soft_bounce_tracked += 1,
                    _ => {}
                }
            }
        }

        let mut events = self.backend.events(None).await?;
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(recent_limit);
        stats.recent_events = events;
        Ok(stats)
    }
}
