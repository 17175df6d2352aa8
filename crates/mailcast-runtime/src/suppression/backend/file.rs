//! File-based suppression backend
//!
//! Keeps the whole registry in one JSON document and rewrites it on every
//! change (write to a sibling temp file, then rename).

use super::SuppressionBackend;
use crate::error::{Result, RuntimeError};
use mailcast_core::{BounceEvent, SuppressionEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    entries: BTreeMap<String, SuppressionEntry>,
    #[serde(default)]
    events: Vec<BounceEvent>,
}

/// File-based suppression backend
pub struct FileBackend {
    file_path: PathBuf,
    document: Mutex<Document>,
}

impl FileBackend {
    /// Open the backend, loading the file if it exists
    pub async fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        let document = Self::load_from_file(&file_path).await?;
        tracing::debug!(
            path = %file_path.display(),
            entries = document.entries.len(),
            "Loaded suppression file"
        );
        Ok(Self {
            file_path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    async fn load_from_file(path: &Path) -> Result<Document> {
        match fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(Document::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                RuntimeError::Storage(format!(
                    "Failed to parse suppression file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(RuntimeError::Storage(format!(
                "Failed to read suppression file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, document: &Document) -> Result<()> {
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| RuntimeError::Storage(format!("Failed to encode suppressions: {}", e)))?;

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    RuntimeError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, content).await.map_err(|e| {
            RuntimeError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.file_path).await.map_err(|e| {
            RuntimeError::Storage(format!(
                "Failed to replace {}: {}",
                self.file_path.display(),
                e
            ))
        })
    }
}

#[async_trait::async_trait]
impl SuppressionBackend for FileBackend {
    async fn load_all(&self) -> Result<Vec<SuppressionEntry>> {
        let document = self.document.lock().await;
        Ok(document.entries.values().cloned().collect())
    }

    async fn upsert(&self, entry: SuppressionEntry) -> Result<()> {
        let mut document = self.document.lock().await;
        document.entries.insert(entry.email.clone(), entry);
        self.persist(&document).await
    }

    async fn remove(&self, email: &str) -> Result<()> {
        let mut document = self.document.lock().await;
        if document.entries.remove(email).is_some() {
            self.persist(&document).await?;
        }
        Ok(())
    }

    async fn append_event(&self, event: BounceEvent) -> Result<()> {
        let mut document = self.document.lock().await;
        document.events.push(event);
        self.persist(&document).await
    }

    async fn events(&self, email: Option<&str>) -> Result<Vec<BounceEvent>> {
        let document = self.document.lock().await;
        Ok(document
            .events
            .iter()
            .filter(|event| email.map_or(true, |email| event.email == email))
            .cloned()
            .collect())
    }
}
