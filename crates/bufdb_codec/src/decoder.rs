//! Record payload decoding.
//!
//! Decoding is defensive: every declared length is bounds-checked
//! against the remaining payload before any slice is taken, so
//! malformed input can never cause a panic or an oversized
//! allocation. A record that fails UTF-8 validation is skipped and
//! decoding resumes at the next record boundary; a record whose
//! lengths run past the end of the payload stops decoding, keeping
//! the records already recovered.

use crate::encoder::padding_len;
use crate::error::{CodecError, CodecResult};
use crate::snapshot::BufferSnapshot;
use tracing::warn;

/// Decodes up to `buffer_count` records from `payload`.
///
/// Returns the recovered snapshots in file order plus the number of
/// records that were skipped or lost to corruption. Per-record
/// corruption is logged, not fatal.
pub fn decode_records(payload: &[u8], buffer_count: u64) -> (Vec<BufferSnapshot>, usize) {
    let mut cursor = Cursor::new(payload);
    let mut snapshots = Vec::new();
    let mut skipped = 0usize;

    for index in 0..buffer_count {
        match read_record(&mut cursor) {
            Ok(snapshot) => snapshots.push(snapshot),
            // The record's extent was fully consumed, so the cursor
            // already sits on the next record boundary.
            Err(err @ CodecError::InvalidUtf8 { .. }) => {
                warn!(record = index, %err, "skipping corrupt record");
                skipped += 1;
            }
            Err(err) => {
                let remaining = buffer_count - index;
                warn!(record = index, %err, "record truncated; dropping remainder of payload");
                skipped = skipped.saturating_add(usize::try_from(remaining).unwrap_or(usize::MAX));
                break;
            }
        }
    }

    (snapshots, skipped)
}

fn read_record(cursor: &mut Cursor<'_>) -> CodecResult<BufferSnapshot> {
    let name_len = cursor.read_u32()? as usize;
    let line_count = cursor.read_u32()?;
    let requires_name = cursor.read_u8()? != 0;
    let is_open = cursor.read_u8()? != 0;
    let dirty = cursor.read_u8()? != 0;
    let _padding0 = cursor.read_u8()?;
    let _padding1 = cursor.read_u32()?;

    let name_bytes = cursor.take(name_len)?;

    // Slice out every line before validating anything, so the cursor
    // lands on the next record boundary even when this one is bad.
    let mut raw_lines = Vec::new();
    for _ in 0..line_count {
        let line_len = cursor.read_u32()? as usize;
        let _reserved = cursor.read_u32()?;
        let bytes = cursor.take(line_len)?;
        cursor.take(padding_len(line_len))?;
        raw_lines.push(bytes);
    }

    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| CodecError::InvalidUtf8 { field: "name" })?;
    let mut lines = Vec::with_capacity(raw_lines.len());
    for raw in raw_lines {
        let line =
            std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 { field: "line" })?;
        lines.push(line.to_string());
    }

    Ok(BufferSnapshot::new(
        name.to_string(),
        lines,
        requires_name,
        is_open,
        dirty,
    ))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(CodecError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_records;

    fn snapshot(name: &str, lines: &[&str]) -> BufferSnapshot {
        BufferSnapshot::new(
            name.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
            false,
            true,
            false,
        )
    }

    #[test]
    fn roundtrip_preserves_order_and_content() {
        let snaps = vec![
            snapshot("alpha", &["first line", "second"]),
            BufferSnapshot::new("beta", vec![], true, false, false),
            snapshot("", &["unnamed scratch"]),
        ];
        let payload = encode_records(&snaps).unwrap();
        let (decoded, skipped) = decode_records(&payload, snaps.len() as u64);
        assert_eq!(decoded, snaps);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn roundtrip_single_scratch_buffer() {
        let snaps = vec![BufferSnapshot::new(
            "scratch",
            vec!["echo hi".into()],
            false,
            true,
            true,
        )];
        let payload = encode_records(&snaps).unwrap();
        let (decoded, skipped) = decode_records(&payload, 1);
        assert_eq!(decoded, snaps);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn roundtrip_unicode_lines() {
        let snaps = vec![snapshot("héllo", &["naïve café", "日本語の行"])];
        let payload = encode_records(&snaps).unwrap();
        let (decoded, skipped) = decode_records(&payload, 1);
        assert_eq!(decoded, snaps);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn empty_payload_decodes_to_nothing() {
        let (decoded, skipped) = decode_records(&[], 0);
        assert!(decoded.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn truncated_payload_keeps_earlier_records() {
        let snaps = vec![snapshot("keep", &["line"]), snapshot("lost", &["line"])];
        let payload = encode_records(&snaps).unwrap();
        let (decoded, skipped) = decode_records(&payload[..payload.len() - 4], 2);
        assert_eq!(decoded, vec![snaps[0].clone()]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn invalid_utf8_record_is_skipped_not_fatal() {
        let snaps = vec![snapshot("bad", &[]), snapshot("good", &["hello"])];
        let mut payload = encode_records(&snaps).unwrap();
        // First record's name starts right after its 16-byte control block.
        payload[16] = 0xff;

        let (decoded, skipped) = decode_records(&payload, 2);
        assert_eq!(decoded, vec![snaps[1].clone()]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn oversized_declared_length_does_not_panic() {
        let mut payload = encode_records(&[snapshot("x", &[])]).unwrap();
        // Claim a name far larger than the payload.
        payload[0..4].copy_from_slice(&u32::MAX.to_le_bytes());

        let (decoded, skipped) = decode_records(&payload, 1);
        assert!(decoded.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn oversized_line_count_does_not_panic() {
        let mut payload = encode_records(&[snapshot("x", &["y"])]).unwrap();
        payload[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

        let (decoded, skipped) = decode_records(&payload, 1);
        assert!(decoded.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn count_beyond_payload_is_reported_as_skipped() {
        let payload = encode_records(&[snapshot("only", &[])]).unwrap();
        let (decoded, skipped) = decode_records(&payload, 5);
        assert_eq!(decoded.len(), 1);
        assert_eq!(skipped, 4);
    }
}
