//! Reconciliation of configured keys with persisted password metadata.

use std::sync::Arc;

use {
    rekey_config::{KeyConfigError, KeyEntry, KeyValidationError},
    secrecy::ExposeSecret,
};

use crate::{
    compound::CompoundEncryptor,
    error::VaultError,
    kdf::{self, SaltedPassword},
    store::{PasswordMetadata, PasswordMetadataStore},
    traits::Encryptor,
};

/// The derived key set for one process start.
#[derive(Debug, Clone)]
pub struct Passwords {
    pub primary: SaltedPassword,
    /// Decrypt-only keys, in configuration order.
    pub secondaries: Vec<SaltedPassword>,
    /// The primary differs from the one recorded by a previous start.
    pub changed_primary: bool,
    /// Label of the primary recorded before this start, if any.
    pub previous_primary: Option<String>,
}

impl Passwords {
    /// The encryptor to install: the bare primary when it is the only key,
    /// otherwise a compound that still opens secondary ciphertext.
    pub fn encryptor(&self) -> Arc<dyn Encryptor> {
        if self.secondaries.is_empty() {
            return self.primary.as_encryptor();
        }
        Arc::new(CompoundEncryptor::new(
            self.primary.as_encryptor(),
            self.secondaries.iter().map(SaltedPassword::as_encryptor).collect(),
        ))
    }

    /// Labels with the primary first.
    pub fn labels(&self) -> Vec<&str> {
        std::iter::once(self.primary.label.as_str())
            .chain(self.secondaries.iter().map(|s| s.label.as_str()))
            .collect()
    }
}

/// Derive a key per configured entry and reconcile it with stored metadata.
///
/// Known labels are re-derived with their stored salt and checked against
/// the stored canary. Unknown labels get a fresh salt and canary, persisted
/// as non-primary rows. Nothing is written unless every known label checks
/// out and the previously recorded primary is still configured.
///
/// The previous-primary check runs before any key is derived. A
/// configuration that both drops the recorded primary and carries a wrong
/// secret is therefore reported as [`VaultError::PreviousPrimaryMissing`],
/// not [`VaultError::PasswordMismatch`].
///
/// When no primary was recorded yet, `changed_primary` is true: existing
/// rows may still be plaintext and have to go through a re-encryption pass.
/// Recording the primary is left to the caller once that pass succeeded.
pub async fn process_passwords(
    entries: &[KeyEntry],
    store: &dyn PasswordMetadataStore,
) -> Result<Passwords, VaultError> {
    let previous = store.find_primary().await?;
    if let Some(previous) = &previous
        && !entries.iter().any(|e| e.label == previous.label)
    {
        return Err(VaultError::PreviousPrimaryMissing {
            label: previous.label.clone(),
        });
    }

    let mut primary = None;
    let mut secondaries = Vec::with_capacity(entries.len().saturating_sub(1));
    let mut pending = Vec::new();

    for entry in entries {
        let salted = match store.find_by_label(&entry.label).await? {
            Some(metadata) => derive_known(entry, &metadata)?,
            None => {
                let salt = kdf::generate_salt();
                let salted = SaltedPassword::new(&entry.label, entry.secret.expose_secret(), &salt)?;
                let canary = kdf::make_canary(salted.encryptor.as_ref())?;
                pending.push(PasswordMetadata {
                    label: entry.label.clone(),
                    salt: salt.to_vec(),
                    canary,
                    primary: false,
                });
                salted
            },
        };

        if entry.primary {
            if primary.is_some() {
                return Err(KeyConfigError::from(KeyValidationError::MultiplePrimaryConfigured).into());
            }
            primary = Some(salted);
        } else {
            secondaries.push(salted);
        }
    }

    let primary = primary
        .ok_or_else(|| VaultError::from(KeyConfigError::from(KeyValidationError::NoPrimaryConfigured)))?;

    for metadata in &pending {
        store.create(metadata).await?;
        #[cfg(feature = "tracing")]
        tracing::info!(label = %metadata.label, "registered new encryption key");
    }

    let changed_primary = previous
        .as_ref()
        .is_none_or(|previous| previous.label != primary.label);

    #[cfg(feature = "tracing")]
    tracing::info!(
        primary = %primary.label,
        secondaries = secondaries.len(),
        changed_primary,
        "encryption keys loaded"
    );

    Ok(Passwords {
        primary,
        secondaries,
        changed_primary,
        previous_primary: previous.map(|p| p.label),
    })
}

/// Derive decrypt-only keys for a start with encryption disabled.
///
/// Only labels that already have stored metadata can have written data, so
/// unknown labels are skipped and nothing is persisted. Known labels must
/// still pass their canary check.
pub async fn load_decrypt_keys(
    entries: &[KeyEntry],
    store: &dyn PasswordMetadataStore,
) -> Result<Vec<SaltedPassword>, VaultError> {
    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        match store.find_by_label(&entry.label).await? {
            Some(metadata) => keys.push(derive_known(entry, &metadata)?),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(label = %entry.label, "skipping unregistered decryption key");
            },
        }
    }
    Ok(keys)
}

fn derive_known(entry: &KeyEntry, metadata: &PasswordMetadata) -> Result<SaltedPassword, VaultError> {
    let salted = SaltedPassword::new(&entry.label, entry.secret.expose_secret(), &metadata.salt)?;
    kdf::check_canary(salted.encryptor.as_ref(), &metadata.canary, &entry.label)?;
    Ok(salted)
}
