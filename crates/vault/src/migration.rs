//! Batch re-encryption of stored ciphertext under a new primary key.
//!
//! A table is walked in key order, one batch at a time. Each field is
//! opened with the decryptor (normally the compound of every configured key)
//! and sealed again with the encryptor (the bare primary). Batches are saved
//! independently: a pass interrupted between batches leaves every row
//! readable by the compound, and re-running it is harmless.

use crate::{
    error::VaultError,
    store::{EncryptedRecord, RecordStore},
    traits::Encryptor,
};

/// Rows loaded and saved per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What to do with a row whose field cannot be decrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the pass and return the error. Earlier batches stay committed.
    #[default]
    Halt,
    /// Leave the row untouched, count it, and keep going.
    SkipAndContinue,
}

/// Outcome of re-encrypting one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub table: String,
    /// Batches loaded, including a final empty one.
    pub batches: usize,
    /// Rows re-encrypted and saved.
    pub rows: usize,
    /// Rows left as they were because they failed to decrypt.
    pub skipped: usize,
}

/// Re-encrypt every field of `table`.
///
/// Empty fields are left alone. `batch_size` of zero is treated as one.
pub async fn reencrypt_table(
    table: &dyn RecordStore,
    decryptor: &dyn Encryptor,
    encryptor: &dyn Encryptor,
    batch_size: usize,
    policy: FailurePolicy,
) -> Result<BatchReport, VaultError> {
    let batch_size = batch_size.max(1);
    let mut report = BatchReport {
        table: table.name().to_string(),
        ..BatchReport::default()
    };
    let mut after: Option<String> = None;

    loop {
        let batch = table.find_batch(after.as_deref(), batch_size).await?;
        report.batches += 1;
        let Some(last) = batch.last() else {
            break;
        };
        after = Some(last.id.clone());

        let mut updated = Vec::with_capacity(batch.len());
        for record in &batch {
            if record.ciphertext.is_empty() {
                continue;
            }
            let plaintext = match decryptor.decrypt(&record.ciphertext) {
                Ok(plaintext) => plaintext,
                Err(e) if policy == FailurePolicy::SkipAndContinue => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(table = %report.table, id = %record.id, error = %e, "skipping undecryptable row");
                    #[cfg(not(feature = "tracing"))]
                    let _ = e;
                    report.skipped += 1;
                    continue;
                },
                Err(e) => return Err(e),
            };
            updated.push(EncryptedRecord {
                id: record.id.clone(),
                ciphertext: encryptor.encrypt(&plaintext)?,
            });
        }

        if !updated.is_empty() {
            table.save_batch(&updated).await?;
            report.rows += updated.len();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            table = %report.table,
            batch = report.batches,
            rows = updated.len(),
            "re-encrypted batch"
        );

        if batch.len() < batch_size {
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!(
        table = %report.table,
        batches = report.batches,
        rows = report.rows,
        skipped = report.skipped,
        "re-encrypted table"
    );

    Ok(report)
}
