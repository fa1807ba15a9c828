//! Transparent encryption of structured entity fields.
//!
//! A [`FieldCodec`] wraps the encryptor chosen at startup. It is built once
//! and handed to every entity accessor that reads or writes an encrypted
//! column, so there is no process-wide encryptor state.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::{error::VaultError, noop::NoopEncryptor, traits::Encryptor};

/// Encodes values to stored ciphertext and back through one encryptor.
#[derive(Clone)]
pub struct FieldCodec {
    encryptor: Arc<dyn Encryptor>,
}

impl FieldCodec {
    pub fn new(encryptor: Arc<dyn Encryptor>) -> Self {
        Self { encryptor }
    }

    /// A codec that stores fields as plaintext.
    pub fn plaintext() -> Self {
        Self::new(Arc::new(NoopEncryptor))
    }

    pub fn encryptor(&self) -> &Arc<dyn Encryptor> {
        &self.encryptor
    }

    /// Encrypt raw bytes (typically an already-serialized JSON document).
    ///
    /// With a plaintext codec the bytes are stored as text, so input that is
    /// not valid UTF-8 is rejected with an error. Encrypting codecs accept
    /// any bytes.
    pub fn encode_raw(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        self.encryptor.encrypt(plaintext)
    }

    /// Decrypt a stored field. An empty field decodes to empty bytes
    /// without consulting the encryptor.
    pub fn decode_raw(&self, stored: &str) -> Result<Vec<u8>, VaultError> {
        if stored.is_empty() {
            return Ok(Vec::new());
        }
        self.encryptor.decrypt(stored)
    }

    /// Serialize `value` to JSON and encrypt it.
    pub fn encode_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, VaultError> {
        let json = serde_json::to_vec(value)?;
        self.encode_raw(&json)
    }

    /// Decrypt a stored field and deserialize it from JSON.
    ///
    /// Returns `None` for an empty field.
    pub fn decode_json<T: DeserializeOwned>(&self, stored: &str) -> Result<Option<T>, VaultError> {
        let plaintext = self.decode_raw(stored)?;
        if plaintext.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }
}

impl std::fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCodec").finish_non_exhaustive()
    }
}
