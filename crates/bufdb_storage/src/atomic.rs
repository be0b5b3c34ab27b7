//! Atomic whole-file replacement.

use crate::error::{StorageError, StorageResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes complete byte sequences to a target path with crash-safe
/// replace semantics.
///
/// The bytes are first written to a sibling temporary file in the same
/// directory, flushed and synced to stable storage, and only then
/// renamed over the target in one step. A crash at any point before
/// the rename leaves the target exactly as it was; a crash after the
/// rename leaves the new complete file.
///
/// # Example
///
/// ```no_run
/// use bufdb_storage::AtomicFile;
/// use std::path::Path;
///
/// let file = AtomicFile::new("buffers.db");
/// file.write(b"complete snapshot bytes").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct AtomicFile {
    target: PathBuf,
}

impl AtomicFile {
    /// Creates a writer for the given target path.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Returns the target path.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Writes `bytes` to the target atomically.
    ///
    /// Equivalent to [`stage`](Self::stage) followed by
    /// [`Staged::commit`].
    pub fn write(&self, bytes: &[u8]) -> StorageResult<()> {
        self.stage(bytes)?.commit()
    }

    /// Writes `bytes` to a synced temporary sibling without touching
    /// the target yet.
    ///
    /// Missing parent directories are created. If this fails at any
    /// point the temporary file is removed and the target is left
    /// untouched.
    pub fn stage(&self, bytes: &[u8]) -> StorageResult<Staged> {
        let file_name = self
            .target
            .file_name()
            .ok_or_else(|| StorageError::InvalidTarget {
                path: self.target.clone(),
            })?;

        if let Some(parent) = self.target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        let temp = self.target.with_file_name(temp_name);

        let staged = Staged {
            temp,
            target: self.target.clone(),
            committed: false,
        };

        let result = (|| -> StorageResult<()> {
            let mut file = File::create(&staged.temp)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })();

        // Dropping `staged` on the error path removes the temp file.
        result?;
        debug!(temp = %staged.temp.display(), bytes = bytes.len(), "staged snapshot file");
        Ok(staged)
    }
}

/// A fully written and synced temporary file awaiting the final rename.
///
/// Dropping a `Staged` without calling [`commit`](Self::commit)
/// discards the temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct Staged {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl Staged {
    /// Atomically replaces the target with the staged file.
    pub fn commit(mut self) -> StorageResult<()> {
        fs::rename(&self.temp, &self.target)?;
        self.committed = true;
        debug!(target = %self.target.display(), "committed snapshot file");
        Ok(())
    }

    /// Path of the temporary file while staged.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Reads a whole file, mapping a missing file to `None`.
pub fn read_if_exists(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
