//! Persistence traits consumed by the rotation orchestrator.

use async_trait::async_trait;

use crate::error::VaultError;

/// Durable record that `label` was registered with `salt`, plus a canary
/// proving which key that produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordMetadata {
    pub label: String,
    pub salt: Vec<u8>,
    pub canary: String,
    pub primary: bool,
}

/// Storage for [`PasswordMetadata`] rows, one per label.
#[async_trait]
pub trait PasswordMetadataStore: Send + Sync {
    async fn find_by_label(&self, label: &str) -> Result<Option<PasswordMetadata>, VaultError>;

    /// The row currently flagged as primary, if any.
    async fn find_primary(&self) -> Result<Option<PasswordMetadata>, VaultError>;

    /// Insert a new row. Labels are unique; inserting a known label fails.
    async fn create(&self, metadata: &PasswordMetadata) -> Result<(), VaultError>;

    /// Flag `label` as primary and clear the flag on every other row.
    async fn mark_primary(&self, label: &str) -> Result<(), VaultError>;

    /// Clear the primary flag on every row, after data went back to plaintext.
    async fn clear_primary(&self) -> Result<(), VaultError>;

    /// All rows, ordered by label.
    async fn list(&self) -> Result<Vec<PasswordMetadata>, VaultError>;
}

/// One encrypted field of one row, addressed by the row's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub id: String,
    pub ciphertext: String,
}

/// A table holding an encrypted column, walked in key order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Table name, for logs and reports.
    fn name(&self) -> &str;

    /// Up to `limit` rows with keys strictly greater than `after`, ordered by key.
    async fn find_batch(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EncryptedRecord>, VaultError>;

    /// Write back the ciphertext of every record in `records` atomically.
    async fn save_batch(&self, records: &[EncryptedRecord]) -> Result<(), VaultError>;
}
