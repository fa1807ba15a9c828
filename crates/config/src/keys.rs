//! Validation of the declarative encryption key list.
//!
//! Entries are checked field by field (entry 0 completely before entry 1),
//! then across the set for duplicates, then for exactly one primary. The
//! first violation wins.

use std::{collections::HashSet, ops::RangeInclusive};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    uuid::Uuid,
};

use crate::{
    error::{KeyConfigError, KeyValidationError},
    schema::{EncryptionConfig, KeysSource, RawKeyEntry},
};

/// Accepted label length, in characters.
pub const LABEL_LENGTH: RangeInclusive<usize> = 5..=1024;

/// Accepted secret length, in characters.
pub const SECRET_LENGTH: RangeInclusive<usize> = 20..=1024;

const SECRET_FIELD: &str = "encryption_key.secret";

/// A validated key entry.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub guid: Uuid,
    pub label: String,
    pub secret: Secret<String>,
    pub primary: bool,
}

/// Parse and validate the `[encryption]` section.
///
/// When encryption is disabled no entry may be primary. Any remaining
/// entries are validated and returned as decrypt-only keys, so data written
/// under them can be turned back into plaintext.
pub fn validate_keys(config: &EncryptionConfig) -> Result<Vec<KeyEntry>, KeyConfigError> {
    let entries = parse_entries(config.keys.as_ref())?;

    if !config.enabled {
        if entries.iter().any(|e| e.primary) {
            return Err(KeyConfigError::PrimaryProvidedWhileDisabled);
        }
        if entries.is_empty() {
            debug!("encryption disabled");
            return Ok(Vec::new());
        }
        let keys = check_entries(entries).map_err(KeyConfigError::InvalidWhileDisabled)?;
        debug!(count = keys.len(), "encryption disabled, keeping decryption keys");
        return Ok(keys);
    }

    let keys = validate_entries(entries)?;
    debug!(count = keys.len(), "validated encryption keys");
    Ok(keys)
}

fn parse_entries(source: Option<&KeysSource>) -> Result<Vec<RawKeyEntry>, KeyConfigError> {
    match source {
        None => Ok(Vec::new()),
        Some(KeysSource::List(entries)) => Ok(entries.clone()),
        Some(KeysSource::Json(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(KeysSource::Json(raw)) => Ok(serde_json::from_str(raw)?),
    }
}

/// Validate raw entries in order, failing on the first violation.
pub fn validate_entries(entries: Vec<RawKeyEntry>) -> Result<Vec<KeyEntry>, KeyValidationError> {
    if entries.is_empty() {
        return Err(KeyValidationError::NoKeysProvided);
    }

    let keys = check_entries(entries)?;
    match keys.iter().filter(|k| k.primary).count() {
        0 => Err(KeyValidationError::NoPrimaryConfigured),
        1 => Ok(keys),
        _ => Err(KeyValidationError::MultiplePrimaryConfigured),
    }
}

/// Per-entry field checks, then label and guid uniqueness.
fn check_entries(entries: Vec<RawKeyEntry>) -> Result<Vec<KeyEntry>, KeyValidationError> {
    let keys = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| validate_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    check_unique(&keys, "label", |k| k.label.clone())?;
    check_unique(&keys, "guid", |k| k.guid.hyphenated().to_string())?;
    Ok(keys)
}

fn validate_entry(index: usize, entry: RawKeyEntry) -> Result<KeyEntry, KeyValidationError> {
    let path = |field: &str| format!("Key[{index}].{field}");

    let guid = Uuid::parse_str(&entry.guid).map_err(|_| KeyValidationError::InvalidUuid {
        path: path("guid"),
    })?;

    if entry.label.is_empty() {
        return Err(KeyValidationError::MissingField {
            path: path("label"),
        });
    }

    let secret = match entry.encryption_key.secret {
        Some(secret) if !secret.expose_secret().is_empty() => secret,
        _ => {
            return Err(KeyValidationError::MissingField {
                path: path(SECRET_FIELD),
            });
        },
    };

    if !LABEL_LENGTH.contains(&entry.label.chars().count()) {
        return Err(KeyValidationError::Length {
            path: path("label"),
            min: *LABEL_LENGTH.start(),
            max: *LABEL_LENGTH.end(),
            value: Some(entry.label),
        });
    }

    if !SECRET_LENGTH.contains(&secret.expose_secret().chars().count()) {
        return Err(KeyValidationError::Length {
            path: path(SECRET_FIELD),
            min: *SECRET_LENGTH.start(),
            max: *SECRET_LENGTH.end(),
            value: None,
        });
    }

    Ok(KeyEntry {
        guid,
        label: entry.label,
        secret,
        primary: entry.primary,
    })
}

fn check_unique(
    keys: &[KeyEntry],
    field: &str,
    value_of: impl Fn(&KeyEntry) -> String,
) -> Result<(), KeyValidationError> {
    let mut seen = HashSet::with_capacity(keys.len());
    for (index, key) in keys.iter().enumerate() {
        let value = value_of(key);
        if !seen.insert(value.clone()) {
            return Err(KeyValidationError::Duplicate {
                path: format!("Key[{index}].{field}"),
                value,
            });
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::RawSecret, rstest::rstest};

    const GUID_A: &str = "dae1dd13-53ed-4c90-8c11-7383b767d5c3";
    const GUID_B: &str = "80e767c6-0599-11ec-b9bf-c36874088e33";

    fn entry(guid: &str, label: &str, secret: &str, primary: bool) -> RawKeyEntry {
        RawKeyEntry {
            guid: guid.into(),
            label: label.into(),
            encryption_key: RawSecret {
                secret: Some(Secret::new(secret.to_string())),
            },
            primary,
        }
    }

    fn enabled(json: &str) -> EncryptionConfig {
        EncryptionConfig {
            enabled: true,
            keys: Some(KeysSource::Json(json.into())),
            ..EncryptionConfig::default()
        }
    }

    fn message(config: &EncryptionConfig) -> String {
        validate_keys(config).unwrap_err().to_string()
    }

    #[test]
    fn accepts_single_primary() {
        let keys = validate_keys(&enabled(
            r#"[{"encryption_key": {"secret":"thisisAveryLongstring"},"guid":"80e767c6-0599-11ec-b9bf-c36874088e33","label":"foo-foo","primary":true}]"#,
        ))
        .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].label, "foo-foo");
        assert!(keys[0].primary);
        assert_eq!(keys[0].secret.expose_secret(), "thisisAveryLongstring");
    }

    #[test]
    fn disabled_without_keys_is_empty() {
        let config = EncryptionConfig::default();
        assert!(validate_keys(&config).unwrap().is_empty());
    }

    #[test]
    fn disabled_with_primary_is_rejected() {
        let mut config = enabled(
            r#"[{"encryption_key": {"secret":"thisisAveryLongstring"},"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","label":"foo-foo","primary":true}]"#,
        );
        config.enabled = false;
        assert!(matches!(
            validate_keys(&config),
            Err(KeyConfigError::PrimaryProvidedWhileDisabled)
        ));
        assert_eq!(
            message(&config),
            "encryption is disabled, but a primary encryption key was provided"
        );
    }

    #[test]
    fn disabled_keeps_secondaries_for_decryption() {
        let mut config = enabled(
            r#"[{"encryption_key": {"secret":"thisisAveryLongstring"},"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","label":"foo-foo","primary":false}]"#,
        );
        config.enabled = false;
        let keys = validate_keys(&config).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].label, "foo-foo");
        assert!(!keys[0].primary);
    }

    #[test]
    fn disabled_with_invalid_secondary_is_rejected() {
        let mut config = enabled(
            r#"[{"encryption_key": {"secret":"short"},"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","label":"foo-foo","primary":false}]"#,
        );
        config.enabled = false;
        assert_eq!(
            message(&config),
            "encryption is disabled, but there was an error validating decryption keys: field must be 20-1024 chars long: Key[0].encryption_key.secret"
        );
    }

    #[test]
    fn enabled_without_keys_fails() {
        let config = EncryptionConfig {
            enabled: true,
            keys: None,
            ..EncryptionConfig::default()
        };
        assert_eq!(
            message(&config),
            "encryption is enabled, but there was an error validating encryption keys: but no encryption keys were provided"
        );
    }

    #[test]
    fn missing_guid() {
        let config = enabled(
            r#"[{"encryption_key": {"secret":"thisisAveryLongstring"},"label":"foo-foo","primary":true}]"#,
        );
        assert_eq!(
            message(&config),
            "encryption is enabled, but there was an error validating encryption keys: field must be a UUID: Key[0].guid"
        );
    }

    #[test]
    fn missing_label() {
        let config = enabled(
            r#"[{"encryption_key": {"secret":"thisisAveryLongstring"},"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","primary":true}]"#,
        );
        assert_eq!(
            message(&config),
            "encryption is enabled, but there was an error validating encryption keys: missing field(s): Key[0].label"
        );
    }

    #[test]
    fn missing_secret() {
        let config = enabled(
            r#"[{"encryption_key": {"secret":""},"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","label":"foo-foo","primary":true}]"#,
        );
        assert_eq!(
            message(&config),
            "encryption is enabled, but there was an error validating encryption keys: missing field(s): Key[0].encryption_key.secret"
        );
    }

    #[test]
    fn short_label_echoes_value() {
        let err = validate_entries(vec![entry(GUID_A, "foo", "thisisAveryLongstring", true)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field must be 5-1024 chars long: foo: Key[0].label"
        );
    }

    #[test]
    fn short_secret_is_not_echoed() {
        let err = validate_entries(vec![entry(GUID_A, "foo-foo", "short", true)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field must be 20-1024 chars long: Key[0].encryption_key.secret"
        );
    }

    #[rstest]
    #[case(4, false)]
    #[case(5, true)]
    #[case(1024, true)]
    #[case(1025, false)]
    fn label_length_boundaries(#[case] len: usize, #[case] ok: bool) {
        let label = "l".repeat(len);
        let result = validate_entries(vec![entry(GUID_A, &label, "thisisAveryLongstring", true)]);
        assert_eq!(result.is_ok(), ok, "label of {len} chars");
    }

    #[rstest]
    #[case(19, false)]
    #[case(20, true)]
    #[case(1024, true)]
    #[case(1025, false)]
    fn secret_length_boundaries(#[case] len: usize, #[case] ok: bool) {
        let secret = "s".repeat(len);
        let result = validate_entries(vec![entry(GUID_A, "label-1", &secret, true)]);
        assert_eq!(result.is_ok(), ok, "secret of {len} chars");
    }

    #[test]
    fn no_primary() {
        let err = validate_entries(vec![entry(GUID_A, "foo-foo", "thisisAveryLongstring", false)])
            .unwrap_err();
        assert_eq!(err, KeyValidationError::NoPrimaryConfigured);
    }

    #[test]
    fn several_primaries() {
        let err = validate_entries(vec![
            entry(GUID_A, "label-1", "thisisAveryLongstring", true),
            entry(GUID_B, "label-2", "thisIs-anotherlongstring", true),
        ])
        .unwrap_err();
        assert_eq!(err, KeyValidationError::MultiplePrimaryConfigured);
    }

    #[test]
    fn duplicate_labels() {
        let err = validate_entries(vec![
            entry(GUID_A, "same-same", "thisisAveryLongstring", false),
            entry(GUID_B, "same-same", "thisIs-anotherlongstring", true),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicated value, must be unique: same-same: Key[1].label"
        );
    }

    #[test]
    fn duplicate_guids() {
        let err = validate_entries(vec![
            entry(GUID_A, "foo-foo", "thisisAveryLongstring", true),
            entry(GUID_A, "wow-wow", "thisIs-anotherlongstring", false),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicated value, must be unique: dae1dd13-53ed-4c90-8c11-7383b767d5c3: Key[1].guid"
        );
    }

    #[test]
    fn first_entry_is_checked_before_duplicates() {
        // A duplicate label exists, but entry 1 also has a bad guid.
        let err = validate_entries(vec![
            entry(GUID_A, "same-same", "thisisAveryLongstring", true),
            entry("nope", "same-same", "thisIs-anotherlongstring", false),
        ])
        .unwrap_err();
        assert_eq!(err, KeyValidationError::InvalidUuid {
            path: "Key[1].guid".into()
        });
    }

    #[test]
    fn inline_list_is_accepted() {
        let config = EncryptionConfig {
            enabled: true,
            keys: Some(KeysSource::List(vec![
                entry(GUID_A, "old-key", "thisisAveryLongstring", false),
                entry(GUID_B, "new-key", "thisIs-anotherlongstring", true),
            ])),
            ..EncryptionConfig::default()
        };
        let keys = validate_keys(&config).unwrap();
        assert_eq!(
            keys.iter().map(|k| k.label.as_str()).collect::<Vec<_>>(),
            ["old-key", "new-key"]
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let config = enabled("[{not json");
        assert!(matches!(
            validate_keys(&config),
            Err(KeyConfigError::Parse(_))
        ));
    }

    #[test]
    fn debug_output_hides_secret() {
        let keys = validate_entries(vec![entry(GUID_A, "foo-foo", "thisisAveryLongstring", true)])
            .unwrap();
        assert!(!format!("{keys:?}").contains("thisisAveryLongstring"));
    }
}
