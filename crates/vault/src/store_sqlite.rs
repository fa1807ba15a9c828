//! SQLite-backed stores using sqlx.

use std::sync::Arc;

use {
    async_trait::async_trait,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{
    error::VaultError,
    store::{EncryptedRecord, PasswordMetadata, PasswordMetadataStore, RecordStore},
};

type MetadataRow = (String, Vec<u8>, String, bool);

fn into_metadata((label, salt, canary, primary): MetadataRow) -> PasswordMetadata {
    PasswordMetadata {
        label,
        salt,
        canary,
        primary,
    }
}

/// SQLite-backed persistence for password metadata.
pub struct SqlitePasswordStore {
    pool: SqlitePool,
}

impl SqlitePasswordStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self, VaultError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordMetadataStore for SqlitePasswordStore {
    async fn find_by_label(&self, label: &str) -> Result<Option<PasswordMetadata>, VaultError> {
        let row: Option<MetadataRow> = sqlx::query_as(
            "SELECT label, salt, canary, is_primary FROM password_metadata WHERE label = ?",
        )
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_metadata))
    }

    async fn find_primary(&self) -> Result<Option<PasswordMetadata>, VaultError> {
        let row: Option<MetadataRow> = sqlx::query_as(
            "SELECT label, salt, canary, is_primary FROM password_metadata WHERE is_primary = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_metadata))
    }

    async fn create(&self, metadata: &PasswordMetadata) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO password_metadata (label, salt, canary, is_primary) VALUES (?, ?, ?, ?)",
        )
        .bind(&metadata.label)
        .bind(&metadata.salt)
        .bind(&metadata.canary)
        .bind(metadata.primary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_primary(&self, label: &str) -> Result<(), VaultError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE password_metadata SET is_primary = 0 WHERE is_primary = 1")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE password_metadata SET is_primary = 1 WHERE label = ?")
            .bind(label)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back the cleared flag.
            return Err(VaultError::Other(anyhow::anyhow!(
                "no password metadata for label {label:?}"
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_primary(&self) -> Result<(), VaultError> {
        sqlx::query("UPDATE password_metadata SET is_primary = 0 WHERE is_primary = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PasswordMetadata>, VaultError> {
        let rows: Vec<MetadataRow> = sqlx::query_as(
            "SELECT label, salt, canary, is_primary FROM password_metadata ORDER BY label",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_metadata).collect())
    }
}

/// The tables holding encrypted columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedTable {
    ProvisionRequestDetails,
    ServiceInstanceDetails,
}

impl EncryptedTable {
    pub const ALL: [Self; 2] = [Self::ProvisionRequestDetails, Self::ServiceInstanceDetails];

    pub fn table(self) -> &'static str {
        match self {
            Self::ProvisionRequestDetails => "provision_request_details",
            Self::ServiceInstanceDetails => "service_instance_details",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            Self::ProvisionRequestDetails => "service_instance_id",
            Self::ServiceInstanceDetails => "id",
        }
    }

    fn field_column(self) -> &'static str {
        match self {
            Self::ProvisionRequestDetails => "request_details",
            Self::ServiceInstanceDetails => "other_details",
        }
    }
}

/// One encrypted column of one SQLite table.
pub struct SqliteRecordStore {
    pool: SqlitePool,
    table: EncryptedTable,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, table: EncryptedTable) -> Self {
        Self { pool, table }
    }

    /// Record stores for every encrypted table, in a fixed order.
    pub fn all(pool: &SqlitePool) -> Vec<Arc<dyn RecordStore>> {
        EncryptedTable::ALL
            .into_iter()
            .map(|table| Arc::new(Self::new(pool.clone(), table)) as Arc<dyn RecordStore>)
            .collect()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        self.table.table()
    }

    async fn find_batch(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EncryptedRecord>, VaultError> {
        let (table, key, field) = (
            self.table.table(),
            self.table.key_column(),
            self.table.field_column(),
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<(String, String)> = match after {
            Some(after) => {
                let sql =
                    format!("SELECT {key}, {field} FROM {table} WHERE {key} > ? ORDER BY {key} LIMIT ?");
                sqlx::query_as(&sql)
                    .bind(after)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            },
            None => {
                let sql = format!("SELECT {key}, {field} FROM {table} ORDER BY {key} LIMIT ?");
                sqlx::query_as(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            },
        };

        Ok(rows
            .into_iter()
            .map(|(id, ciphertext)| EncryptedRecord { id, ciphertext })
            .collect())
    }

    async fn save_batch(&self, records: &[EncryptedRecord]) -> Result<(), VaultError> {
        let (table, key, field) = (
            self.table.table(),
            self.table.key_column(),
            self.table.field_column(),
        );
        let sql =
            format!("UPDATE {table} SET {field} = ?, updated_at = datetime('now') WHERE {key} = ?");

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(&sql)
                .bind(&record.ciphertext)
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
