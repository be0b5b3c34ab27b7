//! Record payload encoding.

use crate::error::{CodecError, CodecResult};
use crate::snapshot::BufferSnapshot;

const ZERO_PADDING: [u8; 8] = [0u8; 8];

/// Encodes snapshots into the record payload, in input order.
///
/// The output is deterministic: the same snapshot list always produces
/// byte-identical payloads. The 32-byte file header is not included;
/// it is written separately so that pipeline layers can wrap only the
/// record payload.
///
/// # Errors
///
/// Returns [`CodecError::LengthOverflow`] if a name or line exceeds
/// `u32::MAX` bytes.
pub fn encode_records(snapshots: &[BufferSnapshot]) -> CodecResult<Vec<u8>> {
    let mut payload = Vec::new();
    for snapshot in snapshots {
        write_record(&mut payload, snapshot)?;
    }
    Ok(payload)
}

/// Zero padding needed to bring `len` up to the next 8-byte boundary.
pub(crate) fn padding_len(len: usize) -> usize {
    (8 - len % 8) % 8
}

fn write_record(out: &mut Vec<u8>, snapshot: &BufferSnapshot) -> CodecResult<()> {
    let name_bytes = snapshot.name.as_bytes();
    let name_len: u32 = name_bytes
        .len()
        .try_into()
        .map_err(|_| CodecError::LengthOverflow { field: "name_len" })?;
    let line_count: u32 = snapshot
        .lines
        .len()
        .try_into()
        .map_err(|_| CodecError::LengthOverflow { field: "line_count" })?;

    // 16-byte control block.
    out.extend_from_slice(&name_len.to_le_bytes());
    out.extend_from_slice(&line_count.to_le_bytes());
    out.push(u8::from(snapshot.requires_name));
    out.push(u8::from(snapshot.is_open));
    out.push(u8::from(snapshot.dirty));
    out.push(0);
    out.extend_from_slice(&0u32.to_le_bytes());

    out.extend_from_slice(name_bytes);

    for line in &snapshot.lines {
        write_line(out, line)?;
    }

    Ok(())
}

fn write_line(out: &mut Vec<u8>, line: &str) -> CodecResult<()> {
    let bytes = line.as_bytes();
    let line_len: u32 = bytes
        .len()
        .try_into()
        .map_err(|_| CodecError::LengthOverflow { field: "line_len" })?;

    out.extend_from_slice(&line_len.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(bytes);

    let padding = padding_len(bytes.len());
    if padding > 0 {
        out.extend_from_slice(&ZERO_PADDING[..padding]);
    }

    Ok(())
}
