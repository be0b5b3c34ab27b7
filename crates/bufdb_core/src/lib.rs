//! # bufdb Core
//!
//! The persistence engine for bufdb snapshot files: pipeline layers
//! (compression and AEAD encryption), key management, configuration
//! resolution, format migration hooks, and the orchestrating
//! [`PersistenceManager`].
//!
//! The byte format itself lives in [`bufdb_codec`]; crash-safe file
//! replacement lives in [`bufdb_storage`]. This crate composes the
//! two: on save the record payload is compressed, optionally
//! encrypted, prefixed with a header, and written atomically; on load
//! the pipeline is rebuilt from the header flags and reversed, so a
//! file written under different settings still loads as long as the
//! algorithms are built in and key material is configured.
//!
//! ## Failure posture
//!
//! Saves report errors to the caller. Loads never do: any load failure
//! downgrades to an empty buffer collection with a warning, reported
//! through [`LoadReport`], so a corrupt or unreadable file can never
//! take the shell down or install partial state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffers;
mod cipher;
mod compression;
mod config;
mod error;
mod keys;
mod manager;
mod migration;
mod pipeline;

pub use buffers::{BufferCollection, BufferSet};
pub use cipher::{Cipher, NONCE_LEN, TAG_LEN};
pub use compression::{Compression, CompressionError};
pub use config::{
    default_database_path, EncryptionConfig, EncryptionMode, PersistenceConfig, PersistenceSection,
};
pub use error::{CoreError, CoreResult};
pub use keys::{
    KeyManager, KeyMaterial, KeySource, SymmetricKey, DEFAULT_PBKDF2_ITERATIONS, KEY_LEN, SALT_LEN,
};
pub use manager::{FlushGuard, LoadPhase, LoadReport, PersistenceManager};
pub use migration::{MigrationRegistry, MigrationStep};
pub use pipeline::{CompressionLayer, EncryptionLayer, PersistencePipeline, PipelineLayer};

pub use bufdb_codec::{BufferSnapshot, FORMAT_VERSION};
