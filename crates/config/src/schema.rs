/// Config schema types (encryption keys, database, rotation).
use {secrecy::Secret, serde::Deserialize};

/// Default location of the SQLite database holding encrypted records.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:rekey.db?mode=rwc";

/// Default number of rows re-encrypted per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RekeyConfig {
    pub encryption: EncryptionConfig,
    pub database: DatabaseConfig,
    pub rotation: RotationConfig,
}

/// `[encryption]` section.
///
/// Disabling encryption is exclusive with configuring a primary key: a
/// disabled section that still names a primary is rejected at validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub keys: Option<KeysSource>,
    /// Raw keys from the single-key `REKEY_ENCRYPTION_KEY` era, used
    /// verbatim (no derivation). They are only ever used to read data
    /// written before labeled keys were configured; the first is the key
    /// that data was last written under.
    pub legacy_keys: Vec<Secret<String>>,
}

/// The key list, either inline or as a JSON document in a string.
///
/// The string form is what environment variables carry, e.g.
/// `REKEY_ENCRYPTION_KEYS='[{"guid": "...", "label": "...", ...}]'`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeysSource {
    Json(String),
    List(Vec<RawKeyEntry>),
}

/// One key entry exactly as written by the operator, before validation.
///
/// Every field defaults so that missing fields surface as validation errors
/// with a field path instead of opaque parse errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawKeyEntry {
    pub guid: String,
    pub label: String,
    pub encryption_key: RawSecret,
    pub primary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSecret {
    pub secret: Option<Secret<String>>,
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:/var/lib/rekey/rekey.db?mode=rwc`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[rotation]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rows loaded, re-encrypted and saved per batch.
    pub batch_size: usize,
    /// Leave undecryptable rows untouched instead of halting the pass.
    pub skip_failures: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_failures: false,
        }
    }
}
