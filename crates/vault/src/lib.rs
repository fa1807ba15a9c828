//! At-rest field encryption with key rotation.
//!
//! Configured passphrases are stretched with PBKDF2 into AES-256-GCM keys.
//! One key is primary and encrypts; the rest only decrypt, through a
//! [`CompoundEncryptor`]. When the primary changes, [`Rotator`] re-encrypts
//! every stored field under it in batches. Entities reach their encrypted
//! columns through a [`FieldCodec`] handed to them by the caller.

pub mod codec;
pub mod compound;
pub mod error;
pub mod gcm;
pub mod kdf;
pub mod migration;
pub mod models;
pub mod noop;
pub mod passwords;
pub mod raw_key;
pub mod rotation;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod traits;

pub use {
    codec::FieldCodec,
    compound::CompoundEncryptor,
    error::VaultError,
    gcm::GcmEncryptor,
    kdf::SaltedPassword,
    migration::{BatchReport, DEFAULT_BATCH_SIZE, FailurePolicy, reencrypt_table},
    models::{ProvisionRequestDetails, ServiceInstanceDetails},
    noop::NoopEncryptor,
    passwords::{Passwords, load_decrypt_keys, process_passwords},
    raw_key::{encryptor_from_key, encryptor_from_keys, is_usable_key},
    rotation::{RotationOptions, RotationOutcome, Rotator, Transition},
    store::{EncryptedRecord, PasswordMetadata, PasswordMetadataStore, RecordStore},
    store_memory::{InMemoryPasswordStore, InMemoryRecordStore},
    store_sqlite::{EncryptedTable, SqlitePasswordStore, SqliteRecordStore},
    traits::Encryptor,
};

/// Run database migrations for the vault crate.
///
/// Creates `password_metadata` and the two tables with encrypted columns.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), VaultError> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
