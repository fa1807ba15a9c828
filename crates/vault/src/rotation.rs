//! Startup orchestration: derive keys, detect a new primary, re-encrypt.

use std::sync::Arc;

use rekey_config::KeyEntry;

use crate::{
    codec::FieldCodec,
    compound::CompoundEncryptor,
    error::VaultError,
    kdf::SaltedPassword,
    migration::{BatchReport, DEFAULT_BATCH_SIZE, FailurePolicy, reencrypt_table},
    noop::NoopEncryptor,
    passwords::{Passwords, load_decrypt_keys, process_passwords},
    store::{PasswordMetadataStore, RecordStore},
    traits::Encryptor,
};

/// Tuning for the re-encryption pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationOptions {
    pub batch_size: usize,
    pub policy: FailurePolicy,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            policy: FailurePolicy::default(),
        }
    }
}

/// What a startup pass did to stored fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Encryption is disabled and nothing encrypted is on record.
    Plaintext,
    /// The recorded primary is still primary.
    Current,
    /// No primary was on record: existing plaintext rows were encrypted.
    Enabled,
    /// The primary moved away from `from`.
    Rotated { from: String },
    /// Encryption was turned off and rows were decrypted back to plaintext.
    Disabled { from: Option<String> },
}

/// Result of a startup pass.
pub struct RotationOutcome {
    /// The encryptor to install for the lifetime of the process.
    pub encryptor: Arc<dyn Encryptor>,
    /// `None` when encryption is disabled.
    pub passwords: Option<Passwords>,
    /// One report per table, only when a pass ran.
    pub reports: Vec<BatchReport>,
    pub transition: Transition,
}

impl RotationOutcome {
    pub fn codec(&self) -> FieldCodec {
        FieldCodec::new(self.encryptor.clone())
    }

    pub fn changed_primary(&self) -> bool {
        self.passwords.as_ref().is_some_and(|p| p.changed_primary)
    }

    /// Rows left under an old key by a skip-and-continue pass.
    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }
}

impl std::fmt::Debug for RotationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationOutcome")
            .field("passwords", &self.passwords)
            .field("reports", &self.reports)
            .field("transition", &self.transition)
            .finish_non_exhaustive()
    }
}

/// Reconciles configured keys with stored metadata and, when the primary
/// changed, re-encrypts every registered table before recording it.
pub struct Rotator {
    metadata: Arc<dyn PasswordMetadataStore>,
    tables: Vec<Arc<dyn RecordStore>>,
    options: RotationOptions,
    legacy: Option<Arc<dyn Encryptor>>,
}

impl Rotator {
    pub fn new(metadata: Arc<dyn PasswordMetadataStore>, tables: Vec<Arc<dyn RecordStore>>) -> Self {
        Self {
            metadata,
            tables,
            options: RotationOptions::default(),
            legacy: None,
        }
    }

    pub fn with_options(mut self, options: RotationOptions) -> Self {
        self.options = options;
        self
    }

    /// Decrypt-only encryptor for data written under an unlabeled raw key,
    /// see [`encryptor_from_keys`](crate::encryptor_from_keys). A passthrough
    /// encryptor is ignored.
    pub fn with_legacy(mut self, legacy: Arc<dyn Encryptor>) -> Self {
        self.legacy = (!legacy.is_passthrough()).then_some(legacy);
        self
    }

    /// Run once at startup, before anything reads or writes encrypted fields.
    ///
    /// Entries without a primary mean encryption is disabled; see
    /// [`Transition::Disabled`]. Otherwise a pass runs whenever no primary is
    /// on record or the configured primary differs from it. The primary is
    /// recorded only after a pass that skipped nothing.
    pub async fn run(&self, entries: &[KeyEntry]) -> Result<RotationOutcome, VaultError> {
        if !entries.iter().any(|e| e.primary) {
            return self.disable(entries).await;
        }

        let passwords = process_passwords(entries, self.metadata.as_ref()).await?;
        let encryptor = self.with_legacy_secondary(passwords.encryptor());

        if !passwords.changed_primary {
            return Ok(RotationOutcome {
                encryptor,
                passwords: Some(passwords),
                reports: Vec::new(),
                transition: Transition::Current,
            });
        }

        let (transition, decryptor) = match &passwords.previous_primary {
            Some(from) => (Transition::Rotated { from: from.clone() }, encryptor.clone()),
            None => (
                Transition::Enabled,
                Arc::new(CompoundEncryptor::new(encryptor.clone(), vec![Arc::new(NoopEncryptor)]))
                    as Arc<dyn Encryptor>,
            ),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            from = passwords.previous_primary.as_deref().unwrap_or("plaintext"),
            to = %passwords.primary.label,
            tables = self.tables.len(),
            "primary key changed, re-encrypting"
        );

        let primary = passwords.primary.as_encryptor();
        let reports = self.reencrypt_all(decryptor.as_ref(), primary.as_ref()).await?;

        let skipped: usize = reports.iter().map(|r| r.skipped).sum();
        if skipped == 0 {
            self.metadata.mark_primary(&passwords.primary.label).await?;
            #[cfg(feature = "tracing")]
            tracing::info!(label = %passwords.primary.label, "recorded new primary key");
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                skipped,
                "rows could not be re-encrypted, keeping the previous primary recorded"
            );
        }

        Ok(RotationOutcome {
            encryptor,
            passwords: Some(passwords),
            reports,
            transition,
        })
    }

    /// Encryption disabled. With nothing encrypted on record this is plain
    /// passthrough. Otherwise every row is decrypted back to plaintext using
    /// the listed keys, which must include the recorded primary, and the
    /// primary flag is cleared. A row no listed key opens is passed through
    /// unchanged.
    async fn disable(&self, entries: &[KeyEntry]) -> Result<RotationOutcome, VaultError> {
        let previous = self.metadata.find_primary().await?;
        if previous.is_none() && self.legacy.is_none() {
            #[cfg(feature = "tracing")]
            tracing::info!("encryption disabled, fields are stored as plaintext");
            return Ok(RotationOutcome {
                encryptor: Arc::new(NoopEncryptor),
                passwords: None,
                reports: Vec::new(),
                transition: Transition::Plaintext,
            });
        }
        if let Some(previous) = &previous
            && !entries.iter().any(|e| e.label == previous.label)
        {
            return Err(VaultError::PreviousPrimaryMissing {
                label: previous.label.clone(),
            });
        }

        let keys = load_decrypt_keys(entries, self.metadata.as_ref()).await?;
        let secondaries = keys
            .iter()
            .map(SaltedPassword::as_encryptor)
            .chain(self.legacy.clone())
            .collect();
        let decryptor: Arc<dyn Encryptor> =
            Arc::new(CompoundEncryptor::new(Arc::new(NoopEncryptor), secondaries));

        #[cfg(feature = "tracing")]
        tracing::info!(
            from = previous.as_ref().map_or("legacy key", |p| p.label.as_str()),
            tables = self.tables.len(),
            "encryption disabled, decrypting stored fields"
        );

        let reports = self.reencrypt_all(decryptor.as_ref(), &NoopEncryptor).await?;
        if previous.is_some() {
            self.metadata.clear_primary().await?;
        }

        Ok(RotationOutcome {
            encryptor: Arc::new(NoopEncryptor),
            passwords: None,
            reports,
            transition: Transition::Disabled {
                from: previous.map(|p| p.label),
            },
        })
    }

    fn with_legacy_secondary(&self, encryptor: Arc<dyn Encryptor>) -> Arc<dyn Encryptor> {
        match &self.legacy {
            Some(legacy) => Arc::new(CompoundEncryptor::new(encryptor, vec![legacy.clone()])),
            None => encryptor,
        }
    }

    async fn reencrypt_all(
        &self,
        decryptor: &dyn Encryptor,
        encryptor: &dyn Encryptor,
    ) -> Result<Vec<BatchReport>, VaultError> {
        let mut reports = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            let report = reencrypt_table(
                table.as_ref(),
                decryptor,
                encryptor,
                self.options.batch_size,
                self.options.policy,
            )
            .await?;
            reports.push(report);
        }
        Ok(reports)
    }
}
