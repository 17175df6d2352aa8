//! File-system repository for Mailcast
//!
//! Loads segment and campaign definitions from YAML and member snapshots
//! from YAML or JSON, and serves the snapshot to the dispatcher through
//! [`MemberSnapshotProvider`](mailcast_runtime::MemberSnapshotProvider).
//!
//! ```no_run
//! use mailcast_repository::FileSystemRepository;
//! use mailcast_runtime::MemoryCampaignStore;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let repo = FileSystemRepository::new("repository")?;
//! let store = MemoryCampaignStore::new();
//! let summary = repo.seed(&store).await?;
//! println!("{} campaigns loaded", summary.campaigns);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file_system;

pub use error::{RepositoryError, RepositoryResult};
pub use file_system::{FileSystemRepository, SeedSummary};
