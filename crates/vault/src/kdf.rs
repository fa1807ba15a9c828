//! PBKDF2 key derivation for passphrase → key, and canary verification.

use std::sync::Arc;

use {rand::RngCore, sha2::Sha256, zeroize::Zeroizing};

use crate::{error::VaultError, gcm::GcmEncryptor, traits::Encryptor};

/// Required salt length in bytes.
pub const SALT_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 iteration count.
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Minimum secret length in bytes.
pub const MIN_SECRET_LEN: usize = 20;

/// Maximum secret length in bytes.
pub const MAX_SECRET_LEN: usize = 1024;

/// Fixed plaintext encrypted per label to prove a passphrase later
/// reproduces the same key.
const CANARY: &[u8] = b"canary value";

/// Runtime key material for one configured label. Never persisted.
#[derive(Debug, Clone)]
pub struct SaltedPassword {
    pub label: String,
    pub encryptor: Arc<GcmEncryptor>,
}

impl SaltedPassword {
    /// Derive the key for `label` from `secret` and the label's `salt`.
    pub fn new(label: &str, secret: &str, salt: &[u8]) -> Result<Self, VaultError> {
        if salt.len() != SALT_LEN {
            return Err(VaultError::InvalidKeyMaterial(format!(
                "salt must be {SALT_LEN} bytes"
            )));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(VaultError::InvalidKeyMaterial(format!(
                "password must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if secret.len() > MAX_SECRET_LEN {
            return Err(VaultError::InvalidKeyMaterial(format!(
                "password must not be more than {MAX_SECRET_LEN} characters"
            )));
        }

        let key = derive_key(secret.as_bytes(), salt);
        Ok(Self {
            label: label.to_string(),
            encryptor: Arc::new(GcmEncryptor::new(key)),
        })
    }

    /// The encryptor as a trait object, for composing.
    pub fn as_encryptor(&self) -> Arc<dyn Encryptor> {
        self.encryptor.clone()
    }
}

/// Derive a 256-bit key from a password and salt using PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ROUNDS, output.as_mut());
    output
}

/// Generate a random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Encrypt the canary constant under `encryptor`.
pub fn make_canary(encryptor: &dyn Encryptor) -> Result<String, VaultError> {
    encryptor.encrypt(CANARY)
}

/// Verify that `encryptor` opens the canary stored for `label`.
///
/// An authentication failure means the configured secret does not match
/// the one this label was registered with, and is reported as
/// [`VaultError::PasswordMismatch`].
pub fn check_canary(encryptor: &dyn Encryptor, stored: &str, label: &str) -> Result<(), VaultError> {
    let mismatch = || VaultError::PasswordMismatch {
        label: label.to_string(),
    };
    match encryptor.decrypt(stored) {
        Ok(plaintext) if plaintext == CANARY => Ok(()),
        Ok(_) | Err(VaultError::Authentication) => Err(mismatch()),
        Err(e) => Err(e),
    }
}
