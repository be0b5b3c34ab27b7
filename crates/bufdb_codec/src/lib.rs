//! # bufdb Codec
//!
//! Fixed binary record format for bufdb snapshot files.
//!
//! This crate is pure: it converts between a list of
//! [`BufferSnapshot`] values and bytes in the on-disk layout, and
//! nothing else. Compression, encryption, and file I/O live in the
//! other bufdb crates.
//!
//! ## Format
//!
//! A file is a 32-byte [`Header`] followed by the record payload
//! (possibly wrapped by pipeline layers). Each record is a 16-byte
//! control block, the name bytes, then one length-prefixed line after
//! another, each line zero-padded to the next 8-byte boundary. All
//! integers are little-endian; booleans are full bytes.
//!
//! ## Guarantees
//!
//! - Encoding is deterministic: equal inputs give byte-identical output.
//! - Decoding never panics on malformed input; every length field is
//!   bounds-checked before use.
//! - A corrupt record is skipped, not fatal to the rest of the file.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod header;
mod snapshot;

pub use decoder::decode_records;
pub use encoder::encode_records;
pub use error::{CodecError, CodecResult};
pub use header::{
    Header, COMPRESSION_MASK, ENCRYPTION_MASK, FORMAT_VERSION, HEADER_SIZE, KNOWN_FLAGS, MAGIC,
};
pub use snapshot::BufferSnapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot_strategy() -> impl Strategy<Value = BufferSnapshot> {
        (
            prop::string::string_regex("[\\PC]{0,24}").expect("invalid regex"),
            prop::collection::vec(
                prop::string::string_regex("[\\PC]{0,80}").expect("invalid regex"),
                0..8,
            ),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(name, lines, requires_name, is_open, dirty)| {
                BufferSnapshot::new(name, lines, requires_name, is_open, dirty)
            })
    }

    proptest! {
        #[test]
        fn roundtrip_any_snapshot_list(snaps in prop::collection::vec(snapshot_strategy(), 0..6)) {
            let payload = encode_records(&snaps).unwrap();
            let (decoded, skipped) = decode_records(&payload, snaps.len() as u64);
            prop_assert_eq!(decoded, snaps);
            prop_assert_eq!(skipped, 0);
        }

        #[test]
        fn encoding_is_pure(snaps in prop::collection::vec(snapshot_strategy(), 0..6)) {
            prop_assert_eq!(encode_records(&snaps).unwrap(), encode_records(&snaps).unwrap());
        }

        #[test]
        fn decode_never_panics_on_noise(payload in prop::collection::vec(any::<u8>(), 0..512),
                                        count in 0u64..16) {
            let _ = decode_records(&payload, count);
        }
    }
}
