//! In-memory stores for testing.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    error::VaultError,
    store::{EncryptedRecord, PasswordMetadata, PasswordMetadataStore, RecordStore},
};

/// In-memory metadata store backed by a `BTreeMap`. No persistence.
#[derive(Default)]
pub struct InMemoryPasswordStore {
    rows: Mutex<BTreeMap<String, PasswordMetadata>>,
}

impl InMemoryPasswordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordMetadataStore for InMemoryPasswordStore {
    async fn find_by_label(&self, label: &str) -> Result<Option<PasswordMetadata>, VaultError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(label).cloned())
    }

    async fn find_primary(&self) -> Result<Option<PasswordMetadata>, VaultError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.values().find(|m| m.primary).cloned())
    }

    async fn create(&self, metadata: &PasswordMetadata) -> Result<(), VaultError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if rows.contains_key(&metadata.label) {
            return Err(VaultError::Other(anyhow::anyhow!(
                "password metadata already exists for label {:?}",
                metadata.label
            )));
        }
        rows.insert(metadata.label.clone(), metadata.clone());
        Ok(())
    }

    async fn mark_primary(&self, label: &str) -> Result<(), VaultError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if !rows.contains_key(label) {
            return Err(VaultError::Other(anyhow::anyhow!(
                "no password metadata for label {label:?}"
            )));
        }
        for (key, row) in rows.iter_mut() {
            row.primary = key == label;
        }
        Ok(())
    }

    async fn clear_primary(&self) -> Result<(), VaultError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        for row in rows.values_mut() {
            row.primary = false;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PasswordMetadata>, VaultError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.values().cloned().collect())
    }
}

/// In-memory encrypted table keyed by row id.
///
/// Records the size of every saved batch so tests can assert on batching.
pub struct InMemoryRecordStore {
    name: String,
    rows: Mutex<BTreeMap<String, String>>,
    saved_batches: Mutex<Vec<usize>>,
}

impl InMemoryRecordStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Mutex::new(BTreeMap::new()),
            saved_batches: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, id: impl Into<String>, ciphertext: impl Into<String>) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(id.into(), ciphertext.into());
    }

    pub fn get(&self, id: &str) -> Option<String> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(id).cloned()
    }

    pub fn all(&self) -> Vec<EncryptedRecord> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter()
            .map(|(id, ciphertext)| EncryptedRecord {
                id: id.clone(),
                ciphertext: ciphertext.clone(),
            })
            .collect()
    }

    /// Sizes of the batches passed to [`RecordStore::save_batch`], in order.
    pub fn saved_batches(&self) -> Vec<usize> {
        self.saved_batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_batch(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EncryptedRecord>, VaultError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .iter()
            .filter(|(id, _)| after.is_none_or(|after| id.as_str() > after))
            .take(limit)
            .map(|(id, ciphertext)| EncryptedRecord {
                id: id.clone(),
                ciphertext: ciphertext.clone(),
            })
            .collect())
    }

    async fn save_batch(&self, records: &[EncryptedRecord]) -> Result<(), VaultError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        for record in records {
            rows.insert(record.id.clone(), record.ciphertext.clone());
        }
        self.saved_batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(records.len());
        Ok(())
    }
}
