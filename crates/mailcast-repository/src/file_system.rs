//! File system based repository
//!
//! Layout under the repository root:
//!
//! ```text
//! segments/**/*.yaml     one segment or a list of segments per file
//! campaigns/**/*.yaml    one campaign or a list of campaigns per file
//! members.yaml           { members: [...], subscribers: [...] }
//! members.json           same document as JSON (used when no YAML exists)
//! ```

use crate::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailcast_core::{default_segments, AudienceSnapshot, Campaign, Member, Segment, SegmentId, Subscriber};
use mailcast_runtime::{CampaignStore, MemberSnapshotProvider};
use path_absolutize::Absolutize;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const SEGMENTS_DIR: &str = "segments";
const CAMPAIGNS_DIR: &str = "campaigns";
const MEMBER_FILES: [&str; 3] = ["members.yaml", "members.yml", "members.json"];

/// Parse a file holding one item or a list of them
fn parse_items<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, serde_yaml::Error> {
    match serde_yaml::from_str::<serde_yaml::Value>(content)? {
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(serde_yaml::from_value)
            .collect(),
        value => serde_yaml::from_value(value).map(|item| vec![item]),
    }
}

/// On-disk member snapshot
#[derive(Debug, Default, Serialize, Deserialize)]
struct MembersDocument {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    subscribers: Vec<Subscriber>,
}

/// What [`FileSystemRepository::seed`] put into a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub segments: usize,
    pub campaigns: usize,
    /// The stock segments were used because the repository defines none
    pub default_segments: bool,
}

/// Loads segments, campaigns and member snapshots from YAML/JSON files
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    root_path: PathBuf,
}

impl FileSystemRepository {
    /// Open a repository rooted at `root_path`, which must exist
    pub fn new<P: AsRef<Path>>(root_path: P) -> RepositoryResult<Self> {
        let path = root_path.as_ref();
        if !path.exists() {
            return Err(RepositoryError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let root_path = path
            .absolutize()
            .map_err(RepositoryError::Io)?
            .to_path_buf();
        Ok(Self { root_path })
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Every segment, ordered by id
    pub async fn load_segments(&self) -> RepositoryResult<Vec<Segment>> {
        let segments = self
            .load_dir::<Segment>(SEGMENTS_DIR, "segment", |s| s.id)
            .await?;
        Ok(segments)
    }

    pub async fn load_segment(&self, id: SegmentId) -> RepositoryResult<Segment> {
        self.load_segments()
            .await?
            .into_iter()
            .find(|segment| segment.id == id)
            .ok_or(RepositoryError::IdNotFound {
                kind: "Segment",
                id,
            })
    }

    /// Every campaign, ordered by id. Each one is validated.
    pub async fn load_campaigns(&self) -> RepositoryResult<Vec<Campaign>> {
        let campaigns = self
            .load_dir::<Campaign>(CAMPAIGNS_DIR, "campaign", |c| c.id)
            .await?;
        Ok(campaigns)
    }

    /// Members and subscribers as stored on disk
    pub async fn load_audience(&self, taken_at: DateTime<Utc>) -> RepositoryResult<AudienceSnapshot> {
        let Some(path) = self.members_file() else {
            tracing::warn!(root = %self.root_path.display(), "No members file found, using an empty snapshot");
            return Ok(AudienceSnapshot::new(taken_at, Vec::new()));
        };

        let content = fs::read_to_string(&path).await?;
        let document: MembersDocument = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| parse_error(&path, e))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| parse_error(&path, e))?
        };

        tracing::debug!(
            path = %path.display(),
            members = document.members.len(),
            subscribers = document.subscribers.len(),
            "Loaded member snapshot"
        );
        Ok(AudienceSnapshot::new(taken_at, document.members).with_subscribers(document.subscribers))
    }

    /// Copy segments and campaigns into `store`.
    ///
    /// A repository without segment files gets the stock segments.
    pub async fn seed(&self, store: &dyn CampaignStore) -> RepositoryResult<SeedSummary> {
        let mut summary = SeedSummary::default();

        let mut segments = self.load_segments().await?;
        if segments.is_empty() {
            segments = default_segments(1)?;
            summary.default_segments = true;
        }
        for segment in &segments {
            store.save_segment(segment).await?;
        }
        summary.segments = segments.len();

        let campaigns = self.load_campaigns().await?;
        for campaign in &campaigns {
            store.save(campaign).await?;
        }
        summary.campaigns = campaigns.len();

        tracing::info!(
            segments = summary.segments,
            campaigns = summary.campaigns,
            default_segments = summary.default_segments,
            "Seeded campaign store"
        );
        Ok(summary)
    }

    fn members_file(&self) -> Option<PathBuf> {
        MEMBER_FILES
            .iter()
            .map(|name| self.root_path.join(name))
            .find(|path| path.is_file())
    }

    async fn load_dir<T>(
        &self,
        dir: &str,
        kind: &'static str,
        id_of: impl Fn(&T) -> u64,
    ) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Validate,
    {
        let root = self.root_path.join(dir);
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        collect_yaml_files(&root, &mut files).await?;
        files.sort();

        let mut items: BTreeMap<u64, T> = BTreeMap::new();
        for path in files {
            let content = fs::read_to_string(&path).await?;
            let parsed: Vec<T> = parse_items(&content).map_err(|e| parse_error(&path, e))?;

            for item in parsed {
                item.validate().map_err(|source| RepositoryError::Invalid {
                    path: path.clone(),
                    source,
                })?;
                let id = id_of(&item);
                if items.insert(id, item).is_some() {
                    return Err(RepositoryError::Duplicate { kind, id, path });
                }
            }
        }

        tracing::debug!(dir, count = items.len(), "Loaded {}s", kind);
        Ok(items.into_values().collect())
    }
}

/// Model validation applied after parsing
trait Validate {
    fn validate(&self) -> mailcast_core::Result<()>;
}

impl Validate for Segment {
    // Rules are validated while deserializing
    fn validate(&self) -> mailcast_core::Result<()> {
        Ok(())
    }
}

impl Validate for Campaign {
    fn validate(&self) -> mailcast_core::Result<()> {
        Campaign::validate(self)
    }
}

#[async_trait]
impl MemberSnapshotProvider for FileSystemRepository {
    /// Re-reads the members file on every call
    async fn snapshot(&self, now: DateTime<Utc>) -> mailcast_runtime::Result<AudienceSnapshot> {
        Ok(self.load_audience(now).await?)
    }
}

/// Recursively collect `.yaml` / `.yml` files under `dir`
async fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> RepositoryResult<()> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() {
            Box::pin(collect_yaml_files(&path, out)).await?;
        } else if matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
