//! # bufdb Storage
//!
//! Crash-safe file replacement for bufdb.
//!
//! This crate knows nothing about the snapshot format; it moves
//! complete byte sequences to and from disk. The single write
//! primitive is atomic replacement: stage into a sibling temporary
//! file, sync, rename. Readers therefore never observe a partially
//! written snapshot file.
//!
//! ## Example
//!
//! ```no_run
//! use bufdb_storage::{read_if_exists, AtomicFile};
//! use std::path::Path;
//!
//! let file = AtomicFile::new("buffers.db");
//! file.write(b"snapshot bytes").unwrap();
//!
//! let bytes = read_if_exists(Path::new("buffers.db")).unwrap();
//! assert!(bytes.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod atomic;
mod error;

pub use atomic::{read_if_exists, AtomicFile, Staged};
pub use error::{StorageError, StorageResult};
