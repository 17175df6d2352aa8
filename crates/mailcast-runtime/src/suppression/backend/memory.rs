//! In-memory suppression backend
//!
//! Suitable for tests and single-process runs; nothing survives a restart.

use super::SuppressionBackend;
use crate::error::Result;
use mailcast_core::{BounceEvent, SuppressionEntry};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory suppression backend
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, SuppressionEntry>>,
    events: RwLock<Vec<BounceEvent>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Backend pre-populated with entries
    pub fn with_entries(entries: impl IntoIterator<Item = SuppressionEntry>) -> Self {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|entry| (entry.email.clone(), entry))
                    .collect(),
            ),
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SuppressionBackend for MemoryBackend {
    async fn load_all(&self) -> Result<Vec<SuppressionEntry>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn upsert(&self, entry: SuppressionEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.email.clone(), entry);
        Ok(())
    }

    async fn remove(&self, email: &str) -> Result<()> {
        self.entries.write().await.remove(email);
        Ok(())
    }

    async fn append_event(&self, event: BounceEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn events(&self, email: Option<&str>) -> Result<Vec<BounceEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| email.map_or(true, |email| event.email == email))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mailcast_core::{BounceType, SuppressionReason};

    #[tokio::test]
    async fn test_memory_backend_entries() {
        let backend = MemoryBackend::new();
        backend
            .upsert(SuppressionEntry::suppressed(
                "a@b.ie",
                SuppressionReason::Manual,
                Utc::now(),
            ))
            .await
            .unwrap();
        assert_eq!(backend.load_all().await.unwrap().len(), 1);

        backend.remove("a@b.ie").await.unwrap();
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_backend_events_filtered_by_email() {
        let backend = MemoryBackend::new();
        backend
            .append_event(BounceEvent::new("a@b.ie", BounceType::Soft, Utc::now()))
            .await
            .unwrap();
        backend
            .append_event(BounceEvent::new("c@d.ie", BounceType::Hard, Utc::now()))
            .await
            .unwrap();

        assert_eq!(backend.events(None).await.unwrap().len(), 2);
        let only_a = backend.events(Some("a@b.ie")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].bounce_type, BounceType::Soft);
    }
}
