//! Encryptor trait shared by the no-op, AES-GCM and compound implementations.

use crate::error::VaultError;

/// Encrypts field payloads to an opaque text blob and back.
///
/// Ciphertext is a `String` because the storage layer keeps encrypted
/// fields in text columns. Implementations are pure CPU work and never
/// perform I/O.
pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext` into a storable string.
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError>;

    /// Decrypt a string previously produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`VaultError::Authentication`] when the data was produced
    /// under a different key or has been tampered with.
    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, VaultError>;

    /// True when `decrypt` accepts any input unchanged. A
    /// [`CompoundEncryptor`](crate::CompoundEncryptor) tries such members
    /// after every real cipher.
    fn is_passthrough(&self) -> bool {
        false
    }
}
