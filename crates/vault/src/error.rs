//! Vault error types.

use rekey_config::KeyConfigError;

/// Errors produced by vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The key configuration is structurally invalid.
    #[error(transparent)]
    Config(#[from] KeyConfigError),

    /// Salt or secret does not satisfy the derivation requirements.
    #[error("{0}")]
    InvalidKeyMaterial(String),

    /// The supplied secret does not reproduce the key recorded for this label.
    #[error("the password for label {label:?} does not match the stored canary")]
    PasswordMismatch { label: String },

    /// Dropping the previous primary would strand data encrypted under it.
    #[error("the previous primary password labeled {label:?} was not specified")]
    PreviousPrimaryMissing { label: String },

    /// Ciphertext did not authenticate under any attempted key.
    #[error("ciphertext failed authentication")]
    Authentication,

    /// Ciphertext is not in the expected encoding (bad base64, truncated).
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Generic error wrapper.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
