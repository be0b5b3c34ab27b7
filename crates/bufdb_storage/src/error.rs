//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The target path has no file name component to derive a
    /// temporary sibling from.
    #[error("target path has no file name: {path}")]
    InvalidTarget {
        /// The offending path.
        path: PathBuf,
    },
}
