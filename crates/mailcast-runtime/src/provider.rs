//! Member snapshot boundary

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailcast_core::AudienceSnapshot;
use tokio::sync::RwLock;

/// Supplies members and subscribers as of a point in time
///
/// Implementations must not cache across calls unless asked to; every
/// dispatch takes a fresh snapshot.
#[async_trait]
pub trait MemberSnapshotProvider: Send + Sync {
    async fn snapshot(&self, now: DateTime<Utc>) -> Result<AudienceSnapshot>;
}

/// Provider over a fixed, replaceable snapshot
#[derive(Debug)]
pub struct StaticSnapshotProvider {
    snapshot: RwLock<AudienceSnapshot>,
}

impl StaticSnapshotProvider {
    pub fn new(snapshot: AudienceSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub async fn replace(&self, snapshot: AudienceSnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl MemberSnapshotProvider for StaticSnapshotProvider {
    async fn snapshot(&self, now: DateTime<Utc>) -> Result<AudienceSnapshot> {
        let mut snapshot = self.snapshot.read().await.clone();
        snapshot.taken_at = now;
        Ok(snapshot)
    }
}
