//! Suppression persistence backends
//!
//! Backends store the per-address entries and the append-only bounce history.
//! The registry keeps the authoritative in-memory copy and writes through.

pub mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use mailcast_core::{BounceEvent, SuppressionEntry};

/// Trait for suppression storage backends
#[async_trait::async_trait]
pub trait SuppressionBackend: Send + Sync {
    /// Load every stored entry
    async fn load_all(&self) -> Result<Vec<SuppressionEntry>>;

    /// Insert or replace the entry keyed by its email
    async fn upsert(&self, entry: SuppressionEntry) -> Result<()>;

    /// Delete the entry for an email; history is kept
    async fn remove(&self, email: &str) -> Result<()>;

    /// Append a bounce to the history
    async fn append_event(&self, event: BounceEvent) -> Result<()>;

    /// Bounce history, oldest first, optionally for one email
    async fn events(&self, email: Option<&str>) -> Result<Vec<BounceEvent>>;
}
