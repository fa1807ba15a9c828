//! Configuration loading and encryption key validation.
//!
//! Config files: `rekey.toml`, `rekey.yaml`, or `rekey.json`
//! Searched in `./` then `~/.config/rekey/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values and `REKEY_*`
//! environment overrides.

pub mod env_subst;
pub mod error;
pub mod keys;
pub mod loader;
pub mod schema;

pub use {
    error::{KeyConfigError, KeyValidationError},
    keys::{KeyEntry, validate_entries, validate_keys},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{DatabaseConfig, EncryptionConfig, KeysSource, RawKeyEntry, RekeyConfig, RotationConfig},
};
