//! Serializable point-in-time copy of one buffer.

/// A point-in-time copy of a buffer's name, flags, and lines.
///
/// Snapshots are constructed fresh from live state at save time and
/// discarded after encoding; they carry no persistent identity of
/// their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// Buffer name; may be empty for unnamed scratch buffers.
    pub name: String,
    /// Buffer contents, one entry per line.
    pub lines: Vec<String>,
    /// Whether the buffer must be named before it can be written out.
    pub requires_name: bool,
    /// Whether the buffer was open in the shell at save time.
    pub is_open: bool,
    /// Whether the buffer had unsaved edits at save time.
    pub dirty: bool,
}

impl BufferSnapshot {
    /// Creates a snapshot from its parts.
    pub fn new(
        name: impl Into<String>,
        lines: Vec<String>,
        requires_name: bool,
        is_open: bool,
        dirty: bool,
    ) -> Self {
        Self {
            name: name.into(),
            lines,
            requires_name,
            is_open,
            dirty,
        }
    }
}
