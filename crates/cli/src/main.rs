mod key_commands;

use {
    clap::{Parser, Subcommand},
    rekey_config::RekeyConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "rekey", about = "rekey: at-rest field encryption with key rotation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides discovery of ./rekey.toml and ~/.config/rekey/).
    #[arg(long, global = true, env = "REKEY_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Database URL (overrides config value).
    #[arg(long, global = true, env = "REKEY_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the encryption key configuration.
    Check,
    /// Register new keys and re-encrypt stored fields if the primary changed.
    Rotate {
        /// Rows re-encrypted per batch (overrides config value).
        #[arg(long)]
        batch_size: Option<usize>,
        /// Leave rows that fail to decrypt untouched instead of stopping.
        #[arg(long, default_value_t = false)]
        skip_failures: bool,
    },
    /// List registered keys and which one is primary.
    Status,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<RekeyConfig> {
    let mut config = match cli.config {
        Some(ref path) => rekey_config::apply_env_overrides(rekey_config::load_config(path)?),
        None => rekey_config::discover_and_load()?,
    };
    // CLI args override config values
    if let Some(ref url) = cli.database_url {
        config.database.url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "rekey starting");

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Check => key_commands::handle_check(&config),
        Commands::Rotate {
            batch_size,
            skip_failures,
        } => key_commands::handle_rotate(&config, batch_size, skip_failures).await,
        Commands::Status => key_commands::handle_status(&config).await,
    }
}
