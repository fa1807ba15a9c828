//! Persisted entities with encrypted columns.
//!
//! The encrypted column is held as stored text; accessors take the
//! [`FieldCodec`] to move between ciphertext and structured values.

use {
    serde::{Serialize, de::DeserializeOwned},
    sqlx::SqlitePool,
};

use crate::{codec::FieldCodec, error::VaultError};

/// Parameters sent with a provision request, stored encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionRequestDetails {
    pub service_instance_id: String,
    /// Stored (possibly encrypted) request details.
    pub request_details: String,
}

impl ProvisionRequestDetails {
    pub fn new(service_instance_id: impl Into<String>) -> Self {
        Self {
            service_instance_id: service_instance_id.into(),
            request_details: String::new(),
        }
    }

    /// Encrypt and store raw JSON request details. Empty input is stored
    /// as the encryption of an empty payload.
    pub fn set_request_details(&mut self, codec: &FieldCodec, raw: &[u8]) -> Result<(), VaultError> {
        self.request_details = codec.encode_raw(raw)?;
        Ok(())
    }

    /// Decrypt the stored request details back to raw JSON bytes.
    pub fn read_request_details(&self, codec: &FieldCodec) -> Result<Vec<u8>, VaultError> {
        codec.decode_raw(&self.request_details)
    }

    /// Insert or replace this row.
    pub async fn save(&self, pool: &SqlitePool) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO provision_request_details (service_instance_id, request_details)
             VALUES (?, ?)
             ON CONFLICT(service_instance_id) DO UPDATE SET
                request_details = excluded.request_details,
                updated_at = datetime('now')",
        )
        .bind(&self.service_instance_id)
        .bind(&self.request_details)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(
        pool: &SqlitePool,
        service_instance_id: &str,
    ) -> Result<Option<Self>, VaultError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT service_instance_id, request_details FROM provision_request_details
             WHERE service_instance_id = ?",
        )
        .bind(service_instance_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(service_instance_id, request_details)| Self {
            service_instance_id,
            request_details,
        }))
    }
}

/// Service instance with free-form details stored encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInstanceDetails {
    pub id: String,
    pub name: String,
    /// Stored (possibly encrypted) JSON details.
    pub other_details: String,
}

impl ServiceInstanceDetails {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            other_details: String::new(),
        }
    }

    /// Serialize `details` to JSON and store it encrypted.
    ///
    /// On error the stored field is left unchanged.
    pub fn set_other_details<T: Serialize + ?Sized>(
        &mut self,
        codec: &FieldCodec,
        details: &T,
    ) -> Result<(), VaultError> {
        self.other_details = codec.encode_json(details)?;
        Ok(())
    }

    /// Decrypt and deserialize the stored details; `None` when never set.
    pub fn read_other_details<T: DeserializeOwned>(
        &self,
        codec: &FieldCodec,
    ) -> Result<Option<T>, VaultError> {
        codec.decode_json(&self.other_details)
    }

    /// Insert or replace this row.
    pub async fn save(&self, pool: &SqlitePool) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO service_instance_details (id, name, other_details)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                other_details = excluded.other_details,
                updated_at = datetime('now')",
        )
        .bind(&self.id)
        .bind(&self.name)
        .bind(&self.other_details)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Self>, VaultError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT id, name, other_details FROM service_instance_details WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id, name, other_details)| Self {
            id,
            name,
            other_details,
        }))
    }
}
