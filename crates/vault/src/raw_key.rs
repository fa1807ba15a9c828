//! Encryptors built directly from raw key strings, without derivation.
//!
//! This is the single-key `ENCRYPTION_KEY` style of configuration that
//! predates labeled keys. A key is used verbatim: its bytes are copied into
//! a zero-padded 32-byte array (longer keys are truncated).

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::{compound::CompoundEncryptor, gcm::GcmEncryptor, noop::NoopEncryptor, traits::Encryptor};

/// Build an encryptor from zero or more raw keys.
///
/// - no keys: [`NoopEncryptor`]
/// - one key: the encryptor for that key
/// - several: a [`CompoundEncryptor`] whose primary is the first key
pub fn encryptor_from_keys(keys: &[&str]) -> Arc<dyn Encryptor> {
    match keys {
        [] => Arc::new(NoopEncryptor),
        [key] => encryptor_from_key(key),
        [primary, secondaries @ ..] => Arc::new(CompoundEncryptor::new(
            encryptor_from_key(primary),
            secondaries.iter().map(|k| encryptor_from_key(k)).collect(),
        )),
    }
}

/// Whether `key` yields a real cipher rather than plaintext passthrough.
pub fn is_usable_key(key: &str) -> bool {
    !key.is_empty() && key.trim() == key
}

/// Build the encryptor for one raw key.
///
/// An empty key, or one with leading or trailing whitespace, is treated as
/// blank and yields a [`NoopEncryptor`]. The key is never trimmed.
pub fn encryptor_from_key(key: &str) -> Arc<dyn Encryptor> {
    if !is_usable_key(key) {
        #[cfg(feature = "tracing")]
        tracing::warn!("blank encryption key, storing fields unencrypted");
        return Arc::new(NoopEncryptor);
    }

    let mut bytes = Zeroizing::new([0u8; 32]);
    let len = key.len().min(32);
    bytes[..len].copy_from_slice(&key.as_bytes()[..len]);
    Arc::new(GcmEncryptor::new(bytes))
}
