//! Resolved persistence configuration.
//!
//! The surrounding shell owns configuration-file parsing and merging;
//! this engine only consumes the result. [`PersistenceSection`] is
//! the deserializable shape handed over by that collaborator, and
//! [`PersistenceSection::resolve`] turns it into the strict
//! [`PersistenceConfig`], rejecting conflicting key sources instead
//! of guessing a precedence.

use crate::cipher::Cipher;
use crate::compression::Compression;
use crate::error::{CoreError, CoreResult};
use crate::keys::{KeySource, SymmetricKey, DEFAULT_PBKDF2_ITERATIONS};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Whether and how the payload is encrypted.
#[derive(Debug, Clone)]
pub enum EncryptionMode {
    /// Plaintext payload.
    Disabled,
    /// AEAD-encrypted payload.
    Enabled(EncryptionConfig),
}

/// Cipher and key source for an encrypted database.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// AEAD cipher to write with.
    pub cipher: Cipher,
    /// Where the key comes from.
    pub keys: KeySource,
}

/// Resolved configuration consumed by the persistence engine.
///
/// Treated as read-only input; the engine never writes configuration
/// back.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Path of the snapshot database file.
    pub path: PathBuf,
    /// Compression selection for newly written files.
    pub compression: Compression,
    /// Encryption selection for newly written files.
    pub encryption: EncryptionMode,
}

impl PersistenceConfig {
    /// Creates a config with default compression and no encryption.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: Compression::default(),
            encryption: EncryptionMode::Disabled,
        }
    }

    /// Sets the compression selection.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the encryption selection.
    #[must_use]
    pub fn with_encryption(mut self, encryption: EncryptionMode) -> Self {
        self.encryption = encryption;
        self
    }
}

/// The persistence section of the shell's configuration file, as
/// handed over after merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceSection {
    /// Database file path; falls back to the platform data directory.
    pub database_path: Option<String>,
    /// Whether to encrypt the payload.
    pub encrypt: Option<bool>,
    /// Cipher name (`chacha20poly1305` default, or `aes256gcm`).
    pub algorithm: Option<String>,
    /// Hex-encoded raw key.
    pub key: Option<String>,
    /// Path of a file containing a hex-encoded key.
    pub key_file: Option<String>,
    /// Passphrase for PBKDF2 derivation.
    pub passphrase: Option<String>,
    /// PBKDF2 iteration count; defaults to 600,000.
    pub pbkdf2_iterations: Option<u32>,
    /// Compression name (`lz4` default, or `none`).
    pub compression: Option<String>,
}

impl PersistenceSection {
    /// Resolves the section into a strict [`PersistenceConfig`].
    ///
    /// # Errors
    ///
    /// Returns a config error for unknown algorithm names, an empty
    /// passphrase, a missing key source on an encrypted database, or
    /// more than one configured key source.
    pub fn resolve(&self) -> CoreResult<PersistenceConfig> {
        let path = self
            .database_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let compression = match self.compression.as_deref() {
            Some(name) => Compression::from_name(name).ok_or_else(|| {
                CoreError::config(format!("unknown compression algorithm '{name}'"))
            })?,
            None => Compression::default(),
        };

        let encryption = if self.encrypt.unwrap_or(false) {
            EncryptionMode::Enabled(EncryptionConfig {
                cipher: self.resolve_cipher()?,
                keys: self.resolve_key_source()?,
            })
        } else {
            EncryptionMode::Disabled
        };

        Ok(PersistenceConfig {
            path,
            compression,
            encryption,
        })
    }

    fn resolve_cipher(&self) -> CoreResult<Cipher> {
        match self.algorithm.as_deref() {
            Some(name) => Cipher::from_name(name)
                .ok_or_else(|| CoreError::config(format!("unknown encryption algorithm '{name}'"))),
            None => Ok(Cipher::default()),
        }
    }

    fn resolve_key_source(&self) -> CoreResult<KeySource> {
        let configured = [
            self.key.is_some(),
            self.key_file.is_some(),
            self.passphrase.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if configured > 1 {
            return Err(CoreError::config(
                "multiple key sources configured (key, key_file, passphrase are mutually exclusive)",
            ));
        }

        if let Some(hex) = &self.key {
            return Ok(KeySource::RawKey(SymmetricKey::from_hex(hex)?));
        }
        if let Some(path) = &self.key_file {
            return Ok(KeySource::KeyFile(PathBuf::from(path)));
        }
        if let Some(passphrase) = &self.passphrase {
            if passphrase.is_empty() {
                return Err(CoreError::config("passphrase cannot be empty"));
            }
            let iterations = self
                .pbkdf2_iterations
                .filter(|iters| *iters > 0)
                .unwrap_or(DEFAULT_PBKDF2_ITERATIONS);
            return Ok(KeySource::Passphrase {
                passphrase: passphrase.clone(),
                iterations,
            });
        }

        Err(CoreError::config(
            "encryption enabled but no key source configured",
        ))
    }
}

/// Default location of the snapshot database file.
pub fn default_database_path() -> PathBuf {
    let base = if cfg!(windows) {
        env::var_os("LOCALAPPDATA").map(PathBuf::from)
    } else if let Some(dir) = env::var_os("XDG_DATA_HOME") {
        Some(PathBuf::from(dir))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
    };

    base.unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("bufdb")
        .join("buffers.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_section_resolves_to_defaults() {
        let config = PersistenceSection::default().resolve().unwrap();
        assert_eq!(config.compression, Compression::Lz4);
        assert!(matches!(config.encryption, EncryptionMode::Disabled));
    }

    #[test]
    fn explicit_path_and_compression() {
        let section = PersistenceSection {
            database_path: Some("/tmp/b.db".into()),
            compression: Some("none".into()),
            ..Default::default()
        };
        let config = section.resolve().unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/b.db"));
        assert_eq!(config.compression, Compression::None);
    }

    #[test]
    fn unknown_compression_name_is_rejected() {
        let section = PersistenceSection {
            compression: Some("zstd".into()),
            ..Default::default()
        };
        assert!(matches!(
            section.resolve(),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn encryption_requires_a_key_source() {
        let section = PersistenceSection {
            encrypt: Some(true),
            ..Default::default()
        };
        assert!(matches!(section.resolve(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn conflicting_key_sources_are_rejected() {
        let section = PersistenceSection {
            encrypt: Some(true),
            key: Some("aa".repeat(32)),
            passphrase: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(matches!(section.resolve(), Err(CoreError::Config { .. })));

        let section = PersistenceSection {
            encrypt: Some(true),
            key_file: Some("/tmp/key.hex".into()),
            passphrase: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(matches!(section.resolve(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn passphrase_defaults_to_600k_iterations() {
        let section = PersistenceSection {
            encrypt: Some(true),
            passphrase: Some("hunter2".into()),
            ..Default::default()
        };
        let config = section.resolve().unwrap();
        let EncryptionMode::Enabled(enc) = config.encryption else {
            panic!("encryption should be enabled");
        };
        let KeySource::Passphrase { iterations, .. } = enc.keys else {
            panic!("expected passphrase source");
        };
        assert_eq!(iterations, DEFAULT_PBKDF2_ITERATIONS);
    }

    #[test]
    fn empty_passphrase_is_rejected() {
        let section = PersistenceSection {
            encrypt: Some(true),
            passphrase: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(section.resolve(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn cipher_name_selects_aes() {
        let section = PersistenceSection {
            encrypt: Some(true),
            algorithm: Some("aes256gcm".into()),
            key: Some("cc".repeat(32)),
            ..Default::default()
        };
        let config = section.resolve().unwrap();
        let EncryptionMode::Enabled(enc) = config.encryption else {
            panic!("encryption should be enabled");
        };
        assert_eq!(enc.cipher, Cipher::Aes256Gcm);
    }
}
