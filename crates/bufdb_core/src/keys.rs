//! Key material resolution and derivation.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key length in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// Salt length for passphrase derivation.
pub const SALT_LEN: usize = 16;

/// Default PBKDF2-HMAC-SHA256 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

/// A 256-bit symmetric key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns a config error unless exactly 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CoreError::config(format!(
                "invalid key size: expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Parses a hex-encoded key, ignoring embedded whitespace.
    pub fn from_hex(input: &str) -> CoreResult<Self> {
        let sanitized: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&sanitized)
            .map_err(|_| CoreError::config("invalid hex key material"))?;
        Self::from_bytes(&bytes)
    }

    /// The raw key bytes. Never log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Where the encryption key comes from. Sources are mutually
/// exclusive; configuration resolution rejects combinations.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Externally supplied 256-bit key.
    RawKey(SymmetricKey),
    /// Hex-encoded key read from a file at use time.
    KeyFile(PathBuf),
    /// Key derived from a passphrase via PBKDF2-HMAC-SHA256 with a
    /// salt persisted alongside the ciphertext.
    Passphrase {
        /// The passphrase.
        passphrase: String,
        /// PBKDF2 iteration count.
        iterations: u32,
    },
}

/// Key plus the salt that must travel with the ciphertext, if any.
pub struct KeyMaterial {
    /// The symmetric key.
    pub key: SymmetricKey,
    /// Fresh salt for passphrase derivation; `None` for direct keys.
    pub salt: Option<[u8; SALT_LEN]>,
}

/// Resolves and derives key material for the encryption layer.
///
/// For passphrase sources the PBKDF2 derivation runs once per manager:
/// the first encryption generates a salt, derives the key, and caches
/// both, so repeated saves (including the drop-time flush) do not
/// rerun the KDF. Clones share the cache.
#[derive(Debug, Clone)]
pub struct KeyManager {
    source: KeySource,
    derived: Arc<Mutex<Option<([u8; SALT_LEN], SymmetricKey)>>>,
}

impl KeyManager {
    /// Creates a manager over the given source.
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            derived: Arc::new(Mutex::new(None)),
        }
    }

    /// Produces key material for encryption. For a passphrase source
    /// the salt and derived key are generated on first use and reused
    /// for the manager's lifetime.
    pub fn material_for_encrypt(&self) -> CoreResult<KeyMaterial> {
        match &self.source {
            KeySource::RawKey(key) => Ok(KeyMaterial {
                key: key.clone(),
                salt: None,
            }),
            KeySource::KeyFile(path) => Ok(KeyMaterial {
                key: read_key_file(path)?,
                salt: None,
            }),
            KeySource::Passphrase {
                passphrase,
                iterations,
            } => {
                let mut cache = self.derived.lock();
                let (salt, key) = cache.get_or_insert_with(|| {
                    let mut salt = [0u8; SALT_LEN];
                    rand::thread_rng().fill_bytes(&mut salt);
                    let key = derive_key(passphrase, &salt, *iterations);
                    (salt, key)
                });
                Ok(KeyMaterial {
                    key: key.clone(),
                    salt: Some(*salt),
                })
            }
        }
    }

    /// Re-derives the key for decryption from the salt stored with
    /// the ciphertext.
    pub fn key_for_decrypt(&self, salt: Option<&[u8]>) -> CoreResult<SymmetricKey> {
        match &self.source {
            KeySource::RawKey(key) => {
                reject_unexpected_salt(salt)?;
                Ok(key.clone())
            }
            KeySource::KeyFile(path) => {
                reject_unexpected_salt(salt)?;
                read_key_file(path)
            }
            KeySource::Passphrase {
                passphrase,
                iterations,
            } => {
                let salt = salt.ok_or_else(|| {
                    CoreError::crypto("encrypted payload is missing the key-derivation salt")
                })?;
                if salt.len() != SALT_LEN {
                    return Err(CoreError::crypto("encrypted payload salt length mismatch"));
                }
                Ok(derive_key(passphrase, salt, *iterations))
            }
        }
    }

    /// KDF metadata for the header's reserved field: salt length in
    /// bits 32-39 and iteration count in bits 0-31 for passphrase
    /// mode, zero otherwise.
    #[must_use]
    pub fn kdf_metadata(&self) -> u64 {
        match &self.source {
            KeySource::Passphrase { iterations, .. } => {
                ((SALT_LEN as u64) << 32) | u64::from(*iterations)
            }
            _ => 0,
        }
    }
}

fn reject_unexpected_salt(salt: Option<&[u8]>) -> CoreResult<()> {
    match salt {
        Some(s) if !s.is_empty() => Err(CoreError::config(
            "encrypted payload carries a salt but a direct key source is configured",
        )),
        _ => Ok(()),
    }
}

fn read_key_file(path: &PathBuf) -> CoreResult<SymmetricKey> {
    let contents = fs::read_to_string(path)?;
    SymmetricKey::from_hex(contents.trim())
}

fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> SymmetricKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key);
    SymmetricKey { bytes: key }
}
