//! AES-256-GCM implementation of the [`Encryptor`] trait.

use {
    aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit},
    },
    base64::Engine,
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::{error::VaultError, traits::Encryptor};

/// Nonce size for AES-GCM (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag size.
const TAG_LEN: usize = 16;

/// AES-256-GCM keyed by a 32-byte key.
///
/// Encrypted blob layout, base64 (standard alphabet, padded):
/// `[nonce: 12 bytes][ciphertext: N bytes][tag: 16 bytes]`.
/// A fresh random nonce is generated for every call.
#[derive(Clone)]
pub struct GcmEncryptor {
    key: Zeroizing<[u8; 32]>,
}

impl GcmEncryptor {
    pub fn new(key: Zeroizing<[u8; 32]>) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        let key: &[u8; 32] = &self.key;
        Aes256Gcm::new(key.into())
    }
}

impl std::fmt::Debug for GcmEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcmEncryptor").finish_non_exhaustive()
    }
}

impl Encryptor for GcmEncryptor {
    #[allow(deprecated)] // upstream generic-array 0.x deprecation
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::Other(anyhow::anyhow!("encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    #[allow(deprecated)]
    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let blob = base64::engine::general_purpose::STANDARD
            .decode(ciphertext)
            .map_err(|e| VaultError::MalformedCiphertext(e.to_string()))?;

        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::MalformedCiphertext(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| VaultError::Authentication)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn encryptor(byte: u8) -> GcmEncryptor {
        GcmEncryptor::new(Zeroizing::new([byte; 32]))
    }

    #[test]
    fn round_trip() {
        let gcm = encryptor(0x42);
        let stored = gcm.encrypt(b"hello vault").unwrap();
        assert_eq!(gcm.decrypt(&stored).unwrap(), b"hello vault");
    }

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::one_byte(vec![0x61])]
    #[case::below_block(vec![7; 15])]
    #[case::one_block(vec![7; 16])]
    #[case::above_block(vec![7; 17])]
    #[case::large((0..64 * 1024).map(|i| (i % 251) as u8).collect())]
    #[case::not_utf8(vec![0xff, 0xfe, 0x00, 0xc3, 0x28])]
    fn round_trip_any_plaintext(#[case] plaintext: Vec<u8>) {
        let gcm = encryptor(0x42);
        let stored = gcm.encrypt(&plaintext).unwrap();
        let blob = base64::engine::general_purpose::STANDARD
            .decode(&stored)
            .unwrap();
        assert_eq!(blob.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
        assert_eq!(gcm.decrypt(&stored).unwrap(), plaintext);
    }

    #[test]
    fn round_trip_empty() {
        let gcm = encryptor(0x42);
        let stored = gcm.encrypt(b"").unwrap();
        assert!(!stored.is_empty());
        assert!(gcm.decrypt(&stored).unwrap().is_empty());
    }

    #[test]
    fn blob_layout() {
        let stored = encryptor(0x42).encrypt(b"foo").unwrap();
        let blob = base64::engine::general_purpose::STANDARD
            .decode(&stored)
            .unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let stored = encryptor(0x42).encrypt(b"secret").unwrap();
        assert!(matches!(
            encryptor(0x43).decrypt(&stored),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let gcm = encryptor(0x42);
        let stored = gcm.encrypt(b"secret").unwrap();
        let mut blob = base64::engine::general_purpose::STANDARD
            .decode(&stored)
            .unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&blob);
        assert!(matches!(
            gcm.decrypt(&tampered),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let gcm = encryptor(0x42);
        let a = gcm.encrypt(b"same").unwrap();
        let b = gcm.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_inputs() {
        let gcm = encryptor(0x42);
        assert!(matches!(
            gcm.decrypt("not base64!!"),
            Err(VaultError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            gcm.decrypt("c2hvcnQ="),
            Err(VaultError::MalformedCiphertext(_))
        ));
        // Plaintext JSON left behind by a previously disabled deployment.
        assert!(gcm.decrypt(r#"{"a":"secret"}"#).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let rendered = format!("{:?}", encryptor(0x42));
        assert_eq!(rendered, "GcmEncryptor { .. }");
    }
}
