use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    schema::{KeysSource, RekeyConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["rekey.toml", "rekey.yaml", "rekey.yml", "rekey.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<RekeyConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply
/// environment overrides.
///
/// Search order:
/// 1. `./rekey.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/rekey/rekey.{toml,yaml,yml,json}` (user-global)
///
/// Unlike a missing file, an unreadable or malformed file is an error: a
/// silently defaulted key list would start the service unencrypted.
pub fn discover_and_load() -> anyhow::Result<RekeyConfig> {
    let config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            RekeyConfig::default()
        },
    };
    Ok(apply_env_overrides(config))
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/rekey/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "rekey").map(|d| d.config_dir().to_path_buf())
}

/// Apply `REKEY_*` environment variables on top of a loaded config.
///
/// - `REKEY_ENCRYPTION_ENABLED`: `true`/`false`/`1`/`0`
/// - `REKEY_ENCRYPTION_KEYS`: JSON key list
/// - `REKEY_ENCRYPTION_KEY`: a single legacy raw key, used verbatim
/// - `REKEY_DATABASE_URL`
/// - `REKEY_BATCH_SIZE`
pub fn apply_env_overrides(config: RekeyConfig) -> RekeyConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

pub(crate) fn apply_env_overrides_with(
    mut config: RekeyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> RekeyConfig {
    if let Some(raw) = lookup("REKEY_ENCRYPTION_ENABLED") {
        match parse_bool(&raw) {
            Some(enabled) => config.encryption.enabled = enabled,
            None => warn!(value = %raw, "ignoring invalid REKEY_ENCRYPTION_ENABLED"),
        }
    }
    if let Some(keys) = lookup("REKEY_ENCRYPTION_KEYS") {
        config.encryption.keys = Some(KeysSource::Json(keys));
    }
    if let Some(key) = lookup("REKEY_ENCRYPTION_KEY") {
        config.encryption.legacy_keys = vec![Secret::new(key)];
    }
    if let Some(url) = lookup("REKEY_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(raw) = lookup("REKEY_BATCH_SIZE") {
        match raw.trim().parse::<usize>() {
            Ok(size) if size > 0 => config.rotation.batch_size = size,
            _ => warn!(value = %raw, "ignoring invalid REKEY_BATCH_SIZE"),
        }
    }
    config
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<RekeyConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let config: RekeyConfig = match ext {
        "toml" => toml::from_str(raw)?,
        "yaml" | "yml" => serde_yaml::from_str(raw)?,
        "json" => serde_json::from_str(raw)?,
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    };
    if config.rotation.batch_size == 0 {
        anyhow::bail!("rotation.batch_size must be greater than zero");
    }
    Ok(config)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::keys::validate_keys, secrecy::ExposeSecret};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml_with_inline_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "rekey.toml",
            r#"
[encryption]
enabled = true

[[encryption.keys]]
guid = "dae1dd13-53ed-4c90-8c11-7383b767d5c3"
label = "first-key"
primary = true
encryption_key = { secret = "thisisAveryLongstring" }

[database]
url = "sqlite::memory:"

[rotation]
batch_size = 25
"#,
        );

        let config = load_config(&path).unwrap();
        assert!(config.encryption.enabled);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.rotation.batch_size, 25);

        let keys = validate_keys(&config.encryption).unwrap();
        assert_eq!(keys[0].label, "first-key");
        assert_eq!(keys[0].secret.expose_secret(), "thisisAveryLongstring");
    }

    #[test]
    fn loads_yaml_with_json_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "rekey.yaml",
            r#"
encryption:
  enabled: true
  keys: '[{"guid":"dae1dd13-53ed-4c90-8c11-7383b767d5c3","label":"yaml-key","encryption_key":{"secret":"thisisAveryLongstring"},"primary":true}]'
"#,
        );

        let config = load_config(&path).unwrap();
        assert!(matches!(config.encryption.keys, Some(KeysSource::Json(_))));
        let keys = validate_keys(&config.encryption).unwrap();
        assert_eq!(keys[0].label, "yaml-key");
    }

    #[test]
    fn defaults_when_sections_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rekey.json", "{}");
        let config = load_config(&path).unwrap();
        assert!(!config.encryption.enabled);
        assert_eq!(config.database.url, crate::schema::DEFAULT_DATABASE_URL);
        assert_eq!(config.rotation.batch_size, crate::schema::DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rekey.toml", "[rotation]\nbatch_size = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rekey.ini", "");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let lookup = |name: &str| match name {
            "REKEY_ENCRYPTION_ENABLED" => Some("true".to_string()),
            "REKEY_ENCRYPTION_KEYS" => Some("[]".to_string()),
            "REKEY_DATABASE_URL" => Some("sqlite:other.db".to_string()),
            "REKEY_BATCH_SIZE" => Some("7".to_string()),
            _ => None,
        };
        let config = apply_env_overrides_with(RekeyConfig::default(), lookup);
        assert!(config.encryption.enabled);
        assert!(matches!(config.encryption.keys, Some(KeysSource::Json(ref k)) if k == "[]"));
        assert_eq!(config.database.url, "sqlite:other.db");
        assert_eq!(config.rotation.batch_size, 7);
    }

    #[test]
    fn legacy_key_from_env_is_kept_verbatim() {
        let lookup = |name: &str| match name {
            "REKEY_ENCRYPTION_KEY" => Some(" padded-legacy-key ".to_string()),
            _ => None,
        };
        let config = apply_env_overrides_with(RekeyConfig::default(), lookup);
        assert_eq!(config.encryption.legacy_keys.len(), 1);
        assert_eq!(
            config.encryption.legacy_keys[0].expose_secret(),
            " padded-legacy-key "
        );
    }

    #[test]
    fn legacy_keys_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "rekey.toml",
            "[encryption]\nlegacy_keys = [\"one-key-here-with-32-bytes-in-it\", \"\"]\n",
        );
        let config = load_config(&path).unwrap();
        let keys: Vec<_> = config
            .encryption
            .legacy_keys
            .iter()
            .map(|k| k.expose_secret().as_str())
            .collect();
        assert_eq!(keys, ["one-key-here-with-32-bytes-in-it", ""]);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let lookup = |name: &str| match name {
            "REKEY_ENCRYPTION_ENABLED" => Some("maybe".to_string()),
            "REKEY_BATCH_SIZE" => Some("0".to_string()),
            _ => None,
        };
        let config = apply_env_overrides_with(RekeyConfig::default(), lookup);
        assert!(!config.encryption.enabled);
        assert_eq!(config.rotation.batch_size, crate::schema::DEFAULT_BATCH_SIZE);
    }
}
