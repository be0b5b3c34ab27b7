//! AEAD ciphers for the pipeline's encryption layer.

use crate::error::{CoreError, CoreResult};
use crate::keys::KEY_LEN;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};

/// AEAD nonce length in bytes (both ciphers).
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes (both ciphers).
pub const TAG_LEN: usize = 16;

/// Authenticated cipher selection, identified by the encryption flag
/// nibble. Both constructions bind a 16-byte tag to the full
/// ciphertext; tag verification failure is a hard failure for the
/// whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cipher {
    /// ChaCha20-Poly1305, id 1.
    #[default]
    ChaCha20Poly1305,
    /// AES-256-GCM, id 2.
    Aes256Gcm,
}

impl Cipher {
    /// The flag nibble value for this cipher.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Cipher::ChaCha20Poly1305 => 1,
            Cipher::Aes256Gcm => 2,
        }
    }

    /// Resolves a non-zero header flag nibble into a cipher.
    pub fn from_id(id: u8) -> CoreResult<Self> {
        match id {
            1 => Ok(Cipher::ChaCha20Poly1305),
            2 => Ok(Cipher::Aes256Gcm),
            other => Err(CoreError::config(format!(
                "unknown encryption algorithm id {other}"
            ))),
        }
    }

    /// Parses a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chacha20poly1305" | "chacha20" | "chacha" | "default" => {
                Some(Cipher::ChaCha20Poly1305)
            }
            "aes256gcm" | "aes-256-gcm" => Some(Cipher::Aes256Gcm),
            _ => None,
        }
    }

    /// Encrypts `plaintext`, appending the authentication tag.
    pub fn seal(self, key: &[u8; KEY_LEN], nonce: &[u8], plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        match self {
            Cipher::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.into())
                .encrypt(ChaChaNonce::from_slice(nonce), plaintext)
                .map_err(|_| CoreError::crypto("ChaCha20-Poly1305 encryption failure")),
            Cipher::Aes256Gcm => Aes256Gcm::new(key.into())
                .encrypt(AesNonce::from_slice(nonce), plaintext)
                .map_err(|_| CoreError::crypto("AES-256-GCM encryption failure")),
        }
    }

    /// Decrypts `ciphertext`, verifying the authentication tag.
    ///
    /// # Errors
    ///
    /// Returns a crypto error on tag mismatch; a tampered or
    /// wrong-key payload never partially decrypts.
    pub fn open(self, key: &[u8; KEY_LEN], nonce: &[u8], ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
        match self {
            Cipher::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.into())
                .decrypt(ChaChaNonce::from_slice(nonce), ciphertext)
                .map_err(|_| CoreError::crypto("ChaCha20-Poly1305 authentication failure")),
            Cipher::Aes256Gcm => Aes256Gcm::new(key.into())
                .decrypt(AesNonce::from_slice(nonce), ciphertext)
                .map_err(|_| CoreError::crypto("AES-256-GCM authentication failure")),
        }
    }
}
