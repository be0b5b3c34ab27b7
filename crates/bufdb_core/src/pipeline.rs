//! Reversible transform layers over the record payload.
//!
//! Layers are applied in order on save (compress, then encrypt) and
//! in reverse on load (decrypt, then decompress). Each layer owns one
//! flag nibble in the file header; the header records exactly which
//! variants produced the payload, so the load side rebuilds the
//! pipeline from the header rather than trusting the current
//! configuration to match the file.

use crate::cipher::{Cipher, NONCE_LEN, TAG_LEN};
use crate::compression::Compression;
use crate::config::{EncryptionMode, PersistenceConfig};
use crate::error::{CoreError, CoreResult};
use crate::keys::KeyManager;
use bufdb_codec::Header;
use rand::RngCore;

/// A reversible transform over the serialized payload, identified by
/// its flag bits in the file header.
pub trait PipelineLayer: Send + Sync {
    /// Applies the forward transform (save direction).
    fn wrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>>;

    /// Applies the inverse transform (load direction).
    fn unwrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>>;

    /// The header flag bits contributed by this layer.
    fn flag_bits(&self) -> u32;
}

/// An ordered list of pipeline layers.
#[derive(Default)]
pub struct PersistencePipeline {
    layers: Vec<Box<dyn PipelineLayer>>,
}

impl PersistencePipeline {
    /// Creates an empty (identity) pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a layer to the forward order.
    pub fn push(&mut self, layer: Box<dyn PipelineLayer>) {
        self.layers.push(layer);
    }

    /// The combined header flags of all layers.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.layers
            .iter()
            .fold(0, |acc, layer| acc | layer.flag_bits())
    }

    /// Runs the layers forward over `data`.
    pub fn wrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        let mut current = data;
        for layer in &self.layers {
            current = layer.wrap(current)?;
        }
        Ok(current)
    }

    /// Runs the layers in reverse over `data`.
    pub fn unwrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        let mut current = data;
        for layer in self.layers.iter().rev() {
            current = layer.unwrap(current)?;
        }
        Ok(current)
    }

    /// Builds the save-direction pipeline from the resolved config.
    #[must_use]
    pub fn for_save(config: &PersistenceConfig) -> Self {
        let mut pipeline = Self::new();
        pipeline.push(Box::new(CompressionLayer::new(config.compression)));
        if let EncryptionMode::Enabled(enc) = &config.encryption {
            pipeline.push(Box::new(EncryptionLayer::new(
                enc.cipher,
                KeyManager::new(enc.keys.clone()),
            )));
        }
        pipeline
    }

    /// Builds the load-direction pipeline from the file header.
    ///
    /// The algorithm ids come from the header (authoritative for what
    /// was written); key material comes from the config. Fails closed
    /// on ids this build does not implement, or when the file is
    /// encrypted and no key source is configured.
    pub fn for_header(header: &Header, config: &PersistenceConfig) -> CoreResult<Self> {
        let mut pipeline = Self::new();
        pipeline.push(Box::new(CompressionLayer::new(Compression::from_id(
            header.compression_id(),
        )?)));

        match header.encryption_id() {
            0 => {}
            id => {
                let cipher = Cipher::from_id(id)?;
                let EncryptionMode::Enabled(enc) = &config.encryption else {
                    return Err(CoreError::config(
                        "file is encrypted but no key source is configured",
                    ));
                };
                pipeline.push(Box::new(EncryptionLayer::new(
                    cipher,
                    KeyManager::new(enc.keys.clone()),
                )));
            }
        }

        Ok(pipeline)
    }
}

/// Compression layer. The `None` variant is the identity transform
/// with flag nibble 0, so the layer abstraction is exercised even in
/// an uncompressed file.
pub struct CompressionLayer {
    algorithm: Compression,
}

impl CompressionLayer {
    /// Creates a layer for the given algorithm.
    pub fn new(algorithm: Compression) -> Self {
        Self { algorithm }
    }
}

impl PipelineLayer for CompressionLayer {
    fn wrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        Ok(self.algorithm.compress(&data)?)
    }

    fn unwrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        Ok(self.algorithm.decompress(&data)?)
    }

    fn flag_bits(&self) -> u32 {
        u32::from(self.algorithm.id())
    }
}

/// AEAD encryption layer.
///
/// Wrapped payload layout: `salt_len u8 | salt | nonce_len u8 | nonce
/// | ciphertext+tag`. Salt and nonce are non-secret and travel with
/// the ciphertext; the tag binds the whole ciphertext, so tampering
/// anywhere fails the entire file.
pub struct EncryptionLayer {
    cipher: Cipher,
    keys: KeyManager,
}

impl EncryptionLayer {
    /// Creates a layer for the given cipher and key manager.
    pub fn new(cipher: Cipher, keys: KeyManager) -> Self {
        Self { cipher, keys }
    }
}

impl PipelineLayer for EncryptionLayer {
    fn wrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        let material = self.keys.material_for_encrypt()?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self.cipher.seal(material.key.as_bytes(), &nonce, &data)?;

        let salt_len = material.salt.map_or(0, |s| s.len());
        let mut output = Vec::with_capacity(2 + salt_len + NONCE_LEN + ciphertext.len());
        output.push(salt_len as u8);
        if let Some(salt) = &material.salt {
            output.extend_from_slice(salt);
        }
        output.push(NONCE_LEN as u8);
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn unwrap(&self, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        let mut rest = data.as_slice();

        let salt_len = take_u8(&mut rest)? as usize;
        let salt = if salt_len > 0 {
            Some(take(&mut rest, salt_len)?)
        } else {
            None
        };

        let nonce_len = take_u8(&mut rest)? as usize;
        if nonce_len != NONCE_LEN {
            return Err(CoreError::crypto("encrypted payload nonce length mismatch"));
        }
        let nonce = take(&mut rest, nonce_len)?;

        if rest.len() < TAG_LEN {
            return Err(CoreError::crypto("encrypted payload shorter than its tag"));
        }

        let key = self.keys.key_for_decrypt(salt)?;
        self.cipher.open(key.as_bytes(), nonce, rest)
    }

    fn flag_bits(&self) -> u32 {
        u32::from(self.cipher.id()) << 4
    }
}

fn take_u8(rest: &mut &[u8]) -> CoreResult<u8> {
    let bytes = take(rest, 1)?;
    Ok(bytes[0])
}

fn take<'a>(rest: &mut &'a [u8], len: usize) -> CoreResult<&'a [u8]> {
    if rest.len() < len {
        return Err(CoreError::crypto("encrypted payload truncated"));
    }
    let (taken, remaining) = rest.split_at(len);
    *rest = remaining;
    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeySource, SymmetricKey, KEY_LEN};

    fn raw_key_manager(byte: u8) -> KeyManager {
        KeyManager::new(KeySource::RawKey(
            SymmetricKey::from_bytes(&[byte; KEY_LEN]).unwrap(),
        ))
    }

    #[test]
    fn empty_pipeline_is_identity_with_zero_flags() {
        let pipeline = PersistencePipeline::new();
        assert_eq!(pipeline.flags(), 0);
        let data = b"payload".to_vec();
        assert_eq!(pipeline.wrap(data.clone()).unwrap(), data);
        assert_eq!(pipeline.unwrap(data.clone()).unwrap(), data);
    }

    #[test]
    fn compression_layer_roundtrip() {
        let layer = CompressionLayer::new(Compression::Lz4);
        assert_eq!(layer.flag_bits(), 0x1);
        let data = b"text that compresses text that compresses".to_vec();
        let wrapped = layer.wrap(data.clone()).unwrap();
        assert_eq!(layer.unwrap(wrapped).unwrap(), data);
    }

    #[test]
    fn identity_compression_layer_has_zero_flag() {
        let layer = CompressionLayer::new(Compression::None);
        assert_eq!(layer.flag_bits(), 0);
        let data = b"untouched".to_vec();
        assert_eq!(layer.wrap(data.clone()).unwrap(), data);
    }

    #[test]
    fn encryption_layer_roundtrip_raw_key() {
        let layer = EncryptionLayer::new(Cipher::ChaCha20Poly1305, raw_key_manager(9));
        assert_eq!(layer.flag_bits(), 0x10);
        let data = b"secret payload".to_vec();
        let wrapped = layer.wrap(data.clone()).unwrap();
        assert_ne!(wrapped, data);
        assert_eq!(layer.unwrap(wrapped).unwrap(), data);
    }

    #[test]
    fn encryption_layer_roundtrip_passphrase() {
        let keys = KeyManager::new(KeySource::Passphrase {
            passphrase: "hunter2".into(),
            iterations: 16,
        });
        let layer = EncryptionLayer::new(Cipher::Aes256Gcm, keys);
        assert_eq!(layer.flag_bits(), 0x20);
        let data = b"secret payload".to_vec();
        let wrapped = layer.wrap(data.clone()).unwrap();
        assert_eq!(layer.unwrap(wrapped).unwrap(), data);
    }

    #[test]
    fn tampered_wrapped_payload_fails() {
        let layer = EncryptionLayer::new(Cipher::ChaCha20Poly1305, raw_key_manager(9));
        let mut wrapped = layer.wrap(b"secret".to_vec()).unwrap();
        let len = wrapped.len();
        wrapped[len - 1] ^= 0xff;
        assert!(matches!(
            layer.unwrap(wrapped),
            Err(CoreError::Crypto { .. })
        ));
    }

    #[test]
    fn truncated_wrapped_payload_fails_cleanly() {
        let layer = EncryptionLayer::new(Cipher::ChaCha20Poly1305, raw_key_manager(9));
        let wrapped = layer.wrap(b"secret".to_vec()).unwrap();
        for len in 0..4 {
            assert!(layer.unwrap(wrapped[..len].to_vec()).is_err());
        }
    }

    #[test]
    fn layers_compose_in_order_and_reverse() {
        let mut pipeline = PersistencePipeline::new();
        pipeline.push(Box::new(CompressionLayer::new(Compression::Lz4)));
        pipeline.push(Box::new(EncryptionLayer::new(
            Cipher::ChaCha20Poly1305,
            raw_key_manager(7),
        )));
        assert_eq!(pipeline.flags(), 0x11);

        let data = b"a long enough payload that compression does something".to_vec();
        let wrapped = pipeline.wrap(data.clone()).unwrap();
        assert_eq!(pipeline.unwrap(wrapped).unwrap(), data);
    }
}
