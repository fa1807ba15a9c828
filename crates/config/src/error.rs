//! Key configuration error types.

/// Errors produced while turning the `[encryption]` section into key entries.
#[derive(Debug, thiserror::Error)]
pub enum KeyConfigError {
    #[error("encryption is disabled, but a primary encryption key was provided")]
    PrimaryProvidedWhileDisabled,

    #[error("encryption is enabled, but there was an error validating encryption keys: {0}")]
    Invalid(#[from] KeyValidationError),

    /// A decrypt-only key listed while encryption is disabled is malformed.
    #[error("encryption is disabled, but there was an error validating decryption keys: {0}")]
    InvalidWhileDisabled(KeyValidationError),

    /// The JSON key document could not be parsed at all.
    #[error("could not parse encryption keys: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A structural violation in the key list, reported with the offending
/// field path (e.g. `Key[0].label`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyValidationError {
    #[error("but no encryption keys were provided")]
    NoKeysProvided,

    #[error("field must be a UUID: {path}")]
    InvalidUuid { path: String },

    #[error("missing field(s): {path}")]
    MissingField { path: String },

    /// `value` is `None` for secret fields. Secrets are deliberately never
    /// echoed, so a too-short secret is reported by path only.
    #[error("field must be {min}-{max} chars long: {}{path}", shown_value(.value))]
    Length {
        path: String,
        min: usize,
        max: usize,
        value: Option<String>,
    },

    #[error("duplicated value, must be unique: {value}: {path}")]
    Duplicate { path: String, value: String },

    #[error("no encryption key is marked as primary")]
    NoPrimaryConfigured,

    #[error("several encryption keys are marked as primary")]
    MultiplePrimaryConfigured,
}

fn shown_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(|v| format!("{v}: "))
        .unwrap_or_default()
}
