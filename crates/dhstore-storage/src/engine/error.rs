//! Storage error types.

use thiserror::Error;

/// Errors surfaced by a storage backend.
///
/// Backend errors are passed through with their original message; the store
/// layer never retries. Absent keys are not errors and are represented as
/// `None` on the read paths.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened or created.
    #[error("failed to open database: {0}")]
    Open(String),

    /// The backend reported data corruption.
    #[error("database corruption detected: {0}")]
    Corruption(String),

    /// Any other backend failure (I/O, locks, resource limits).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;
