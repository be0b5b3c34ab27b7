//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding snapshot records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The file does not start with the bufdb magic constant.
    #[error("invalid magic header")]
    BadMagic,

    /// The on-disk format version is newer than this build understands.
    #[error("unsupported format version {found} (highest supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the file header.
        found: u32,
        /// Highest version this build can read.
        supported: u32,
    },

    /// The header carries flag bits this build does not define.
    #[error("unknown header flag bits: {flags:#010x}")]
    UnknownFlags {
        /// The offending flags word.
        flags: u32,
    },

    /// A declared length runs past the end of the payload.
    #[error("unexpected end of payload")]
    UnexpectedEof,

    /// A name or line field contains invalid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 {
        /// Which field failed validation.
        field: &'static str,
    },

    /// A length does not fit the fixed-width field that stores it.
    #[error("value overflow in {field}")]
    LengthOverflow {
        /// Which field overflowed.
        field: &'static str,
    },
}
