//! Error types for the bufdb core engine.

use crate::compression::CompressionError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading or saving snapshot files.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record format error (bad magic, malformed lengths, unknown
    /// flag bits, unsupported version).
    #[error("codec error: {0}")]
    Codec(#[from] bufdb_codec::CodecError),

    /// Atomic file replacement failed.
    #[error("storage error: {0}")]
    Storage(#[from] bufdb_storage::StorageError),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// The on-disk version is older than current and no migration
    /// path is registered for it.
    #[error("no migration path from format version {from}")]
    UnsupportedMigration {
        /// The stranded on-disk version.
        from: u32,
    },

    /// Authentication-tag mismatch or unusable key material.
    #[error("crypto error: {message}")]
    Crypto {
        /// Description of the failure.
        message: String,
    },

    /// Conflicting or unknown key sources or algorithm selections.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is the version gate firing (on-disk format
    /// newer than this build, or older with no migration path).
    #[must_use]
    pub fn is_version_error(&self) -> bool {
        matches!(
            self,
            Self::Codec(bufdb_codec::CodecError::UnsupportedVersion { .. })
                | Self::UnsupportedMigration { .. }
        )
    }
}
