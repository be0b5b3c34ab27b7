//! Compression algorithms for the pipeline's compression layer.

use crate::error::{CoreError, CoreResult};
use lz4_flex::frame::{Error as Lz4FrameError, FrameDecoder, FrameEncoder};
use std::io::{Read, Write};
use thiserror::Error;

/// Compression algorithm selection, identified by the low flag nibble.
///
/// Ids 2 (zstd) and 3 (snappy) are reserved in the format but not
/// built into this crate; a file carrying one of them fails closed at
/// load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Identity transform, id 0.
    None,
    /// LZ4 frame format, id 1.
    #[default]
    Lz4,
}

impl Compression {
    /// The flag nibble value for this algorithm.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
        }
    }

    /// Resolves a header flag nibble into an algorithm.
    ///
    /// # Errors
    ///
    /// Reserved-but-unbuilt ids and undefined ids are rejected; the
    /// semantics of an id this build does not implement are never
    /// guessed.
    pub fn from_id(id: u8) -> CoreResult<Self> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Err(CoreError::config(
                "file uses zstd compression, which is not built into this binary",
            )),
            3 => Err(CoreError::config(
                "file uses snappy compression, which is not built into this binary",
            )),
            other => Err(CoreError::config(format!(
                "unknown compression algorithm id {other}"
            ))),
        }
    }

    /// Parses a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Some(Compression::None),
            "lz4" | "default" => Some(Compression::Lz4),
            _ => None,
        }
    }

    /// Compresses `data`.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => {
                let mut encoder = FrameEncoder::new(Vec::new());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Decompresses `data`.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Lz4 => {
                let mut decoder = FrameDecoder::new(data);
                let mut output = Vec::new();
                decoder.read_to_end(&mut output)?;
                Ok(output)
            }
        }
    }
}

/// Errors from the compression codecs.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// I/O error inside a streaming codec.
    #[error("compression I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed LZ4 frame.
    #[error("LZ4 frame error: {0}")]
    Lz4Frame(#[from] Lz4FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz4_roundtrip() {
        let data = b"repeated text repeated text repeated text repeated text".to_vec();
        let compressed = Compression::Lz4.compress(&data).unwrap();
        assert_ne!(compressed, data);
        assert_eq!(Compression::Lz4.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn none_is_identity() {
        let data = b"anything".to_vec();
        assert_eq!(Compression::None.compress(&data).unwrap(), data);
        assert_eq!(Compression::None.decompress(&data).unwrap(), data);
    }

    #[test]
    fn lz4_rejects_garbage() {
        assert!(Compression::Lz4.decompress(b"not an lz4 frame").is_err());
    }

    #[test]
    fn ids_roundtrip_for_built_algorithms() {
        for alg in [Compression::None, Compression::Lz4] {
            assert_eq!(Compression::from_id(alg.id()).unwrap(), alg);
        }
    }

    #[test]
    fn reserved_ids_fail_closed() {
        assert!(matches!(
            Compression::from_id(2),
            Err(CoreError::Config { .. })
        ));
        assert!(matches!(
            Compression::from_id(3),
            Err(CoreError::Config { .. })
        ));
        assert!(matches!(
            Compression::from_id(9),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn names_parse() {
        assert_eq!(Compression::from_name("LZ4"), Some(Compression::Lz4));
        assert_eq!(Compression::from_name("none"), Some(Compression::None));
        assert_eq!(Compression::from_name("zstd"), None);
    }
}
