//! Error types for the repository layer

use mailcast_core::CoreError;
use mailcast_runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur while loading repository files
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Repository root does not exist
    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Two files define the same id
    #[error("Duplicate {kind} id {id} in {path}")]
    Duplicate {
        kind: &'static str,
        id: u64,
        path: PathBuf,
    },

    #[error("{kind} not found: {id}")]
    IdNotFound { kind: &'static str, id: u64 },

    /// Loaded data failed model validation
    #[error("Invalid data in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the runtime stores
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<RepositoryError> for RuntimeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Runtime(inner) => inner,
            other => RuntimeError::Storage(other.to_string()),
        }
    }
}
