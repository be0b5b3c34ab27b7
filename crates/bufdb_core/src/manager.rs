//! The orchestrating persistence engine.
//!
//! [`PersistenceManager`] owns the buffer collection behind a lock,
//! assembles the save pipeline from configuration and the load
//! pipeline from the file header, and writes through the atomic
//! replacement layer. Load failures never leave the shell with a
//! partially hydrated session: every failure downgrades to an empty
//! collection plus a warning, and the cause is surfaced in the
//! returned [`LoadReport`].

use crate::buffers::BufferCollection;
use crate::config::{EncryptionMode, PersistenceConfig};
use crate::error::CoreResult;
use crate::keys::KeyManager;
use crate::migration::MigrationRegistry;
use crate::pipeline::PersistencePipeline;
use bufdb_codec::{decode_records, encode_records, Header, HEADER_SIZE};
use bufdb_storage::{read_if_exists, AtomicFile};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The phases a load pass moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing read yet.
    NotStarted,
    /// Header parsed and validated.
    HeaderRead,
    /// Pipeline layers reversed over the payload.
    PipelineReversed,
    /// Records decoded from the plain payload.
    Decoded,
    /// Buffers replaced with the decoded records.
    Hydrated,
    /// Terminal failure; the collection was hydrated empty instead.
    Failed,
}

/// Outcome of a load pass.
#[derive(Debug)]
pub struct LoadReport {
    /// The phase reached. [`LoadPhase::Hydrated`] on success.
    pub phase: LoadPhase,
    /// Records skipped over corrupt content within an otherwise
    /// readable file.
    pub skipped: usize,
    /// The failure that ended the pass, if any.
    pub error: Option<crate::error::CoreError>,
}

impl LoadReport {
    /// Whether the pass hydrated the collection from the file (or from
    /// nothing, for a missing file).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Coordinates snapshot persistence for one buffer collection and one
/// database file.
pub struct PersistenceManager<C: BufferCollection> {
    config: PersistenceConfig,
    buffers: Mutex<C>,
    migrations: MigrationRegistry,
    // Built once so the key manager's derivation cache survives
    // across saves; passphrase keys are derived on the first save
    // only.
    save_pipeline: PersistencePipeline,
    save_gate: Mutex<()>,
    save_pending: AtomicBool,
}

impl<C: BufferCollection> PersistenceManager<C> {
    /// Creates a manager over the given collection and resolved config.
    pub fn new(config: PersistenceConfig, buffers: C) -> Self {
        let save_pipeline = PersistencePipeline::for_save(&config);
        Self {
            config,
            buffers: Mutex::new(buffers),
            migrations: MigrationRegistry::new(),
            save_pipeline,
            save_gate: Mutex::new(()),
            save_pending: AtomicBool::new(false),
        }
    }

    /// Registers a migration step lifting format version `from` to
    /// `from + 1`. Call before [`load`](Self::load).
    #[must_use]
    pub fn with_migration<F>(mut self, from: u32, step: F) -> Self
    where
        F: Fn(Vec<u8>) -> CoreResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.migrations.register(from, step);
        self
    }

    /// The resolved configuration this manager runs with.
    #[must_use]
    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// The shared buffer collection. The shell mutates buffers through
    /// this lock between saves.
    pub fn buffers(&self) -> &Mutex<C> {
        &self.buffers
    }

    /// Loads the database file and hydrates the collection.
    ///
    /// A missing file hydrates an empty collection and counts as
    /// success. Any failure (unreadable header, future version,
    /// missing migration step, bad key, tampered ciphertext) hydrates
    /// an empty collection too, logs a warning, and is reported in the
    /// returned [`LoadReport`] rather than escalated. Partially
    /// decoded state is never installed.
    pub fn load(&self) -> LoadReport {
        let mut phase = LoadPhase::NotStarted;
        match self.try_load(&mut phase) {
            Ok(skipped) => {
                if skipped > 0 {
                    warn!(
                        path = %self.config.path.display(),
                        skipped,
                        "skipped corrupt records while loading snapshot file"
                    );
                }
                LoadReport {
                    phase: LoadPhase::Hydrated,
                    skipped,
                    error: None,
                }
            }
            Err(err) => {
                warn!(
                    path = %self.config.path.display(),
                    reached = ?phase,
                    error = %err,
                    "snapshot load failed; starting with empty buffers"
                );
                self.buffers.lock().hydrate(Vec::new());
                LoadReport {
                    phase: LoadPhase::Failed,
                    skipped: 0,
                    error: Some(err),
                }
            }
        }
    }

    fn try_load(&self, phase: &mut LoadPhase) -> CoreResult<usize> {
        let Some(bytes) = read_if_exists(&self.config.path)? else {
            debug!(path = %self.config.path.display(), "no snapshot file; starting empty");
            self.buffers.lock().hydrate(Vec::new());
            return Ok(0);
        };

        let header = Header::decode(&bytes)?;
        header.ensure_version_supported()?;
        header.ensure_flags_known()?;
        *phase = LoadPhase::HeaderRead;

        let pipeline = PersistencePipeline::for_header(&header, &self.config)?;
        let payload = pipeline.unwrap(bytes[HEADER_SIZE..].to_vec())?;
        *phase = LoadPhase::PipelineReversed;

        let payload = self.migrations.migrate(header.version, payload)?;
        let (snapshots, skipped) = decode_records(&payload, header.buffer_count);
        *phase = LoadPhase::Decoded;

        debug!(
            path = %self.config.path.display(),
            buffers = snapshots.len(),
            skipped,
            "hydrating buffers from snapshot file"
        );
        self.buffers.lock().hydrate(snapshots);
        *phase = LoadPhase::Hydrated;
        Ok(skipped)
    }

    /// Persists the current buffers to the database file.
    ///
    /// Saves are serialized through an internal gate. Each request
    /// marks the state dirty and then waits for the gate; whoever
    /// holds it drains the dirty flag, so a waiter whose state was
    /// already picked up by the in-flight writer returns without
    /// writing a second time. By the time this returns, the state as
    /// of the call has reached disk.
    pub fn save(&self) -> CoreResult<()> {
        self.save_pending.store(true, Ordering::SeqCst);
        let _gate = self.save_gate.lock();
        while self.save_pending.swap(false, Ordering::SeqCst) {
            self.save_once()?;
        }
        Ok(())
    }

    fn save_once(&self) -> CoreResult<()> {
        // Copy the state out, then release the lock before the
        // expensive encode/compress/encrypt/I/O work.
        let snapshots = self.buffers.lock().snapshot();

        let payload = encode_records(&snapshots)?;
        let wrapped = self.save_pipeline.wrap(payload)?;

        let header = Header::new(
            self.save_pipeline.flags(),
            self.kdf_metadata(),
            snapshots.len() as u64,
        );
        let mut bytes = Vec::with_capacity(HEADER_SIZE + wrapped.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&wrapped);

        AtomicFile::new(&self.config.path).write(&bytes)?;
        debug!(
            path = %self.config.path.display(),
            buffers = snapshots.len(),
            bytes = bytes.len(),
            "saved snapshot file"
        );
        Ok(())
    }

    fn kdf_metadata(&self) -> u64 {
        match &self.config.encryption {
            EncryptionMode::Enabled(enc) => KeyManager::new(enc.keys.clone()).kdf_metadata(),
            EncryptionMode::Disabled => 0,
        }
    }
}

impl<C: BufferCollection> std::fmt::Debug for PersistenceManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("path", &self.config.path)
            .finish_non_exhaustive()
    }
}

/// Scoped save-on-exit guarantee.
///
/// Dropping the guard runs a best-effort save, covering both normal
/// shell exit and unwinds. A failed flush is logged, never escalated;
/// hard-kill safety rests on the atomic rename keeping the previous
/// complete file. The exit flush does bounded work: passphrase keys
/// are derived once per manager and cached, so no KDF runs on the
/// drop path after the first save.
pub struct FlushGuard<C: BufferCollection> {
    manager: Arc<PersistenceManager<C>>,
}

impl<C: BufferCollection> FlushGuard<C> {
    /// Creates a guard over the given manager.
    pub fn new(manager: Arc<PersistenceManager<C>>) -> Self {
        Self { manager }
    }
}

impl<C: BufferCollection> Drop for FlushGuard<C> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.save() {
            warn!(error = %err, "final snapshot flush failed");
        }
    }
}
