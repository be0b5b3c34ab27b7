//! The seam between the persistence engine and the live buffers.

use bufdb_codec::BufferSnapshot;

/// A set of text buffers that can be captured to and restored from
/// snapshots.
///
/// The persistence engine only ever sees buffers through this trait:
/// [`snapshot`](Self::snapshot) copies the current state out from
/// under the caller's lock, and [`hydrate`](Self::hydrate) replaces
/// the state wholesale. Hydration is all-or-nothing; the engine never
/// calls it with a partially decoded file.
pub trait BufferCollection: Send {
    /// Captures every buffer in its current order.
    fn snapshot(&self) -> Vec<BufferSnapshot>;

    /// Replaces all buffers with the given snapshots.
    fn hydrate(&mut self, snapshots: Vec<BufferSnapshot>);
}

/// An insertion-ordered, name-keyed in-memory buffer set.
#[derive(Debug, Default)]
pub struct BufferSet {
    buffers: Vec<BufferSnapshot>,
}

impl BufferSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a buffer, replacing any existing buffer with the same
    /// name in place.
    pub fn upsert(&mut self, snapshot: BufferSnapshot) {
        match self.buffers.iter_mut().find(|b| b.name == snapshot.name) {
            Some(existing) => *existing = snapshot,
            None => self.buffers.push(snapshot),
        }
    }

    /// Looks a buffer up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BufferSnapshot> {
        self.buffers.iter().find(|b| b.name == name)
    }

    /// Removes a buffer by name, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<BufferSnapshot> {
        let index = self.buffers.iter().position(|b| b.name == name)?;
        Some(self.buffers.remove(index))
    }

    /// Number of buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the set holds no buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Iterates the buffers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BufferSnapshot> {
        self.buffers.iter()
    }
}

impl BufferCollection for BufferSet {
    fn snapshot(&self) -> Vec<BufferSnapshot> {
        self.buffers.clone()
    }

    fn hydrate(&mut self, snapshots: Vec<BufferSnapshot>) {
        self.buffers = snapshots;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(name: &str, line: &str) -> BufferSnapshot {
        BufferSnapshot::new(name, vec![line.to_string()], false, true, false)
    }

    #[test]
    fn upsert_preserves_insertion_order() {
        let mut set = BufferSet::new();
        set.upsert(buffer("a", "1"));
        set.upsert(buffer("b", "2"));
        set.upsert(buffer("a", "updated"));

        let names: Vec<_> = set.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(set.get("a").unwrap().lines, ["updated"]);
    }

    #[test]
    fn remove_returns_the_buffer() {
        let mut set = BufferSet::new();
        set.upsert(buffer("a", "1"));
        assert_eq!(set.remove("a").unwrap().name, "a");
        assert!(set.remove("a").is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn hydrate_replaces_everything() {
        let mut set = BufferSet::new();
        set.upsert(buffer("old", "stale"));

        set.hydrate(vec![buffer("x", "1"), buffer("y", "2")]);
        assert_eq!(set.len(), 2);
        assert!(set.get("old").is_none());
        assert_eq!(set.snapshot().len(), 2);
    }
}
