//! Passthrough [`Encryptor`] used when encryption is disabled.

use crate::{error::VaultError, traits::Encryptor};

/// Stores payloads as plaintext.
///
/// This is an explicit configuration choice, never a fallback after a
/// cipher error. Encrypted fields live in text columns, so `encrypt`
/// rejects payloads that are not valid UTF-8 instead of storing them
/// lossily.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopEncryptor;

impl Encryptor for NoopEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        String::from_utf8(plaintext.to_vec())
            .map_err(|e| VaultError::Other(anyhow::anyhow!("plaintext is not valid UTF-8: {e}")))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        Ok(ciphertext.as_bytes().to_vec())
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_text_through() {
        let stored = NoopEncryptor.encrypt(br#"{"a":"secret"}"#).unwrap();
        assert_eq!(stored, r#"{"a":"secret"}"#);
        assert_eq!(NoopEncryptor.decrypt(&stored).unwrap(), br#"{"a":"secret"}"#);
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(NoopEncryptor.encrypt(b"").unwrap(), "");
        assert!(NoopEncryptor.decrypt("").unwrap().is_empty());
    }

    #[test]
    fn rejects_binary_plaintext() {
        let err = NoopEncryptor.encrypt(&[0xff, 0xfe]).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
        assert!(NoopEncryptor.is_passthrough());
    }
}
