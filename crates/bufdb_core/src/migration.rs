//! Forward migration of decoded payloads from older format versions.
//!
//! Steps run after the pipeline layers are reversed and before record
//! decoding, so they see the same plain record bytes regardless of how
//! the file was compressed or encrypted.

use crate::error::{CoreError, CoreResult};
use bufdb_codec::FORMAT_VERSION;
use std::collections::BTreeMap;
use tracing::debug;

/// A single migration step, rewriting a version `v` payload into a
/// version `v + 1` payload.
pub type MigrationStep = Box<dyn Fn(Vec<u8>) -> CoreResult<Vec<u8>> + Send + Sync>;

/// Registered per-version migration steps.
///
/// The registry holds one step per source version. Loading a file at
/// version `v < FORMAT_VERSION` applies the steps for `v`, `v + 1`, …
/// in order; a gap in the chain fails the load with
/// [`CoreError::UnsupportedMigration`].
#[derive(Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<u32, MigrationStep>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the step that lifts version `from` to `from + 1`,
    /// replacing any previous step for that version.
    pub fn register<F>(&mut self, from: u32, step: F)
    where
        F: Fn(Vec<u8>) -> CoreResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.steps.insert(from, Box::new(step));
    }

    /// Lifts `payload` from `from` up to the current format version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedMigration`] naming the first
    /// version with no registered step, or the step's own error.
    pub fn migrate(&self, from: u32, payload: Vec<u8>) -> CoreResult<Vec<u8>> {
        let mut current = payload;
        for version in from..FORMAT_VERSION {
            let step = self
                .steps
                .get(&version)
                .ok_or(CoreError::UnsupportedMigration { from: version })?;
            current = step(current)?;
            debug!(from = version, to = version + 1, "migrated snapshot payload");
        }
        Ok(current)
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("versions", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}
