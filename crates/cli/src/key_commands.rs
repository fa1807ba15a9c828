use std::sync::Arc;

use {
    anyhow::{Context, Result},
    rekey_config::{KeyEntry, RekeyConfig, validate_keys},
    rekey_vault::{
        BatchReport, Encryptor, FailurePolicy, PasswordMetadataStore, RotationOptions, Rotator,
        SqlitePasswordStore, SqliteRecordStore, Transition, encryptor_from_keys, is_usable_key,
    },
    secrecy::ExposeSecret,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::{debug, info},
};

/// Validate the key configuration without touching the database.
pub fn handle_check(config: &RekeyConfig) -> Result<()> {
    let keys = validate_keys(&config.encryption)?;
    if keys.is_empty() {
        println!("Encryption is disabled; fields are stored as plaintext.");
    } else {
        if !config.encryption.enabled {
            println!("Encryption is disabled; listed keys only decrypt existing fields.");
        }
        println!("Encryption keys ({}):", keys.len());
        for line in describe_keys(&keys) {
            println!("  {line}");
        }
    }
    if let Some(line) = describe_legacy_keys(config) {
        println!("{line}");
    }
    Ok(())
}

/// Reconcile keys with the database and re-encrypt if the primary changed.
pub async fn handle_rotate(
    config: &RekeyConfig,
    batch_size: Option<usize>,
    skip_failures: bool,
) -> Result<()> {
    let keys = validate_keys(&config.encryption)?;
    let pool = connect(&config.database.url).await?;

    let options = RotationOptions {
        batch_size: batch_size.unwrap_or(config.rotation.batch_size),
        policy: if skip_failures || config.rotation.skip_failures {
            FailurePolicy::SkipAndContinue
        } else {
            FailurePolicy::Halt
        },
    };
    debug!(?options, "starting rotation");

    let mut rotator = Rotator::new(
        Arc::new(SqlitePasswordStore::with_pool(pool.clone())),
        SqliteRecordStore::all(&pool),
    )
    .with_options(options);
    if let Some(legacy) = legacy_encryptor(config) {
        rotator = rotator.with_legacy(legacy);
    }
    let result = rotator.run(&keys).await;
    pool.close().await;
    let outcome = result?;

    let primary = outcome
        .passwords
        .as_ref()
        .map(|p| p.primary.label.as_str())
        .unwrap_or_default();
    match &outcome.transition {
        Transition::Plaintext => println!("Encryption is disabled; nothing to rotate."),
        Transition::Current => {
            println!("Primary key {primary:?} is current; nothing to re-encrypt.");
        },
        Transition::Enabled => println!("Encryption enabled with primary key {primary:?}."),
        Transition::Rotated { from } => {
            println!("Primary key changed from {from:?} to {primary:?}.");
        },
        Transition::Disabled { from } => match from {
            Some(from) => println!("Encryption disabled; fields decrypted from {from:?}."),
            None => println!("Encryption disabled; fields decrypted from the legacy key."),
        },
    }
    for report in &outcome.reports {
        println!("  {}", format_report(report));
    }
    if outcome.skipped() > 0 {
        eprintln!(
            "{} row(s) could not be decrypted and were left as is; the new primary was not recorded.",
            outcome.skipped()
        );
    }
    Ok(())
}

/// List persisted key metadata. Salts and canaries are never printed.
pub async fn handle_status(config: &RekeyConfig) -> Result<()> {
    let pool = connect(&config.database.url).await?;
    let store = SqlitePasswordStore::with_pool(pool.clone());
    let rows = store.list().await;
    pool.close().await;
    let rows = rows?;

    if rows.is_empty() {
        println!("No encryption keys registered.");
        return Ok(());
    }
    for row in &rows {
        let marker = if row.primary { " (primary)" } else { "" };
        println!("  {}{marker}", row.label);
    }
    Ok(())
}

async fn connect(url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .with_context(|| format!("failed to open database {url}"))?;
    rekey_vault::run_migrations(&pool).await?;
    info!("database ready");
    Ok(pool)
}

/// Decrypt-only encryptor for `legacy_keys`, if any are configured.
fn legacy_encryptor(config: &RekeyConfig) -> Option<Arc<dyn Encryptor>> {
    let keys: Vec<&str> = config
        .encryption
        .legacy_keys
        .iter()
        .map(|k| k.expose_secret().as_str())
        .collect();
    (!keys.is_empty()).then(|| encryptor_from_keys(&keys))
}

/// Summary of `legacy_keys`, flagging blank or whitespace-padded ones.
fn describe_legacy_keys(config: &RekeyConfig) -> Option<String> {
    let keys = &config.encryption.legacy_keys;
    if keys.is_empty() {
        return None;
    }
    let ignored = keys
        .iter()
        .filter(|k| !is_usable_key(k.expose_secret()))
        .count();
    let mut line = format!("Legacy keys: {}", keys.len());
    if ignored > 0 {
        line.push_str(&format!(
            ", {ignored} blank or whitespace-padded (read as plaintext)"
        ));
    }
    Some(line)
}

/// One line per key, primary marked. Secrets are never included.
fn describe_keys(keys: &[KeyEntry]) -> Vec<String> {
    keys.iter()
        .map(|k| {
            let marker = if k.primary { " (primary)" } else { "" };
            format!("{} [{}]{marker}", k.label, k.guid)
        })
        .collect()
}

fn format_report(report: &BatchReport) -> String {
    let mut line = format!(
        "{}: {} row(s) in {} batch(es)",
        report.table, report.rows, report.batches
    );
    if report.skipped > 0 {
        line.push_str(&format!(", {} skipped", report.skipped));
    }
    line
}
