//! The fixed 32-byte file header.

use crate::error::{CodecError, CodecResult};

/// Magic constant at the start of every bufdb file.
pub const MAGIC: [u8; 8] = *b"BUFDB\0\0\0";

/// Highest format version this build reads and the version it writes.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Mask of the compression id nibble (bits 0-3).
pub const COMPRESSION_MASK: u32 = 0x0000_000f;

/// Mask of the encryption id nibble (bits 4-7).
pub const ENCRYPTION_MASK: u32 = 0x0000_00f0;

/// All flag bits this build defines. Any other set bit rejects the file.
pub const KNOWN_FLAGS: u32 = COMPRESSION_MASK | ENCRYPTION_MASK;

/// The fixed header written before the wrapped payload.
///
/// All integers are little-endian. The low nibble of `flags` selects
/// the compression algorithm, the next nibble the encryption
/// algorithm. `reserved` carries KDF metadata when a passphrase-derived
/// key is in use and is zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version of the payload.
    pub version: u32,
    /// Pipeline layer flags.
    pub flags: u32,
    /// KDF/salt metadata, or zero.
    pub reserved: u64,
    /// Number of records in the decoded payload.
    pub buffer_count: u64,
}

impl Header {
    /// Creates a header for a freshly encoded payload at the current version.
    pub fn new(flags: u32, reserved: u64, buffer_count: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags,
            reserved,
            buffer_count,
        }
    }

    /// Encodes the header into its fixed 32-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&MAGIC);
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.reserved.to_le_bytes());
        out[24..32].copy_from_slice(&self.buffer_count.to_le_bytes());
        out
    }

    /// Decodes a header from the start of `bytes`, validating the magic.
    ///
    /// Version and flag validation are separate steps so callers can
    /// distinguish an older-but-migratable file from a newer one.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer than 32 bytes are
    /// available and [`CodecError::BadMagic`] if the constant does not
    /// match exactly.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::UnexpectedEof);
        }
        if bytes[0..8] != MAGIC {
            return Err(CodecError::BadMagic);
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let flags = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let reserved = u64::from_le_bytes([
            bytes[16], bytes[17], bytes[18], bytes[19], bytes[20], bytes[21], bytes[22], bytes[23],
        ]);
        let buffer_count = u64::from_le_bytes([
            bytes[24], bytes[25], bytes[26], bytes[27], bytes[28], bytes[29], bytes[30], bytes[31],
        ]);

        Ok(Self {
            version,
            flags,
            reserved,
            buffer_count,
        })
    }

    /// Rejects the header if its version is newer than this build supports.
    pub fn ensure_version_supported(&self) -> CodecResult<()> {
        if self.version > FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: self.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    /// Rejects the header if any flag bit outside the defined nibbles is set.
    ///
    /// Bits this build does not understand must never be guessed at;
    /// a file carrying them fails closed.
    pub fn ensure_flags_known(&self) -> CodecResult<()> {
        if self.flags & !KNOWN_FLAGS != 0 {
            return Err(CodecError::UnknownFlags { flags: self.flags });
        }
        Ok(())
    }

    /// The compression algorithm id (low nibble of `flags`).
    #[must_use]
    pub fn compression_id(&self) -> u8 {
        (self.flags & COMPRESSION_MASK) as u8
    }

    /// The encryption algorithm id (second nibble of `flags`).
    #[must_use]
    pub fn encryption_id(&self) -> u8 {
        ((self.flags & ENCRYPTION_MASK) >> 4) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let header = Header::new(0x21, 7, 42);
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let parsed = Header::decode(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.compression_id(), 1);
        assert_eq!(parsed.encryption_id(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Header::new(0, 0, 0).encode();
        bytes[0] = b'X';
        assert_eq!(Header::decode(&bytes), Err(CodecError::BadMagic));
    }

    #[test]
    fn rejects_short_input() {
        let bytes = Header::new(0, 0, 0).encode();
        assert_eq!(
            Header::decode(&bytes[..HEADER_SIZE - 1]),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn rejects_future_version() {
        let mut header = Header::new(0, 0, 0);
        header.version = FORMAT_VERSION + 1;
        assert_eq!(
            header.ensure_version_supported(),
            Err(CodecError::UnsupportedVersion {
                found: FORMAT_VERSION + 1,
                supported: FORMAT_VERSION,
            })
        );
    }

    #[test]
    fn rejects_undefined_flag_bits() {
        let header = Header::new(0x100, 0, 0);
        assert_eq!(
            header.ensure_flags_known(),
            Err(CodecError::UnknownFlags { flags: 0x100 })
        );
    }

    #[test]
    fn accepts_defined_flag_nibbles() {
        // Every compression/encryption nibble combination stays within
        // the defined mask.
        let header = Header::new(0xff, 0, 0);
        assert!(header.ensure_flags_known().is_ok());
    }
}
