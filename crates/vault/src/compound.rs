//! Multi-key [`Encryptor`] used while a key rotation is in flight.

use std::sync::Arc;

use crate::{error::VaultError, traits::Encryptor};

/// Encrypts under the primary only and decrypts by trial: primary first,
/// then each secondary in configured order.
///
/// Ciphertext carries no key identifier, so trial decryption is what lets
/// data written under any previously-primary key stay readable. Passthrough
/// members such as [`NoopEncryptor`](crate::NoopEncryptor) accept anything,
/// so they are tried only after every other member has failed.
#[derive(Clone)]
pub struct CompoundEncryptor {
    primary: Arc<dyn Encryptor>,
    secondaries: Vec<Arc<dyn Encryptor>>,
}

impl CompoundEncryptor {
    pub fn new(primary: Arc<dyn Encryptor>, secondaries: Vec<Arc<dyn Encryptor>>) -> Self {
        Self {
            primary,
            secondaries,
        }
    }

    /// Number of keys tried on decrypt.
    pub fn len(&self) -> usize {
        1 + self.secondaries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for CompoundEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundEncryptor")
            .field("secondaries", &self.secondaries.len())
            .finish_non_exhaustive()
    }
}

impl Encryptor for CompoundEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        self.primary.encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let members = || std::iter::once(&self.primary).chain(&self.secondaries);
        let ciphers = members().filter(|m| !m.is_passthrough());
        let passthrough = members().filter(|m| m.is_passthrough());

        let mut last_err = None;
        for member in ciphers.chain(passthrough) {
            match member.decrypt(ciphertext) {
                Ok(plaintext) => return Ok(plaintext),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(VaultError::Authentication))
    }

    fn is_passthrough(&self) -> bool {
        std::iter::once(&self.primary)
            .chain(&self.secondaries)
            .all(|m| m.is_passthrough())
    }
}
