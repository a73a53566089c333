//! PrintHub server binary.
//!
//! Configuration is layered: JSON file (optional), then `PRINTHUB_*`
//! environment variables, then command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use printhub::config::{self, Config};
use printhub::db::{self, Database};
use printhub::{AppState, FileBlobStore, JobDispatcher, OrderIntake, TransitionPolicy};

#[derive(Parser, Debug)]
#[command(name = "printhub")]
#[command(about = "Print shop order intake and print-job dispatch service")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, env = "PRINTHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory for uploaded documents (overrides config)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Reject status reports that skip a lifecycle step
    #[arg(long, default_value_t = false)]
    enforce_transitions: bool,
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    config::apply_env_overrides(&mut config).context("invalid environment override")?;

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = &cli.database {
        config.database.path = Some(path.clone());
    }
    if let Some(dir) = &cli.upload_dir {
        config.storage.upload_dir = dir.clone();
    }
    if cli.enforce_transitions {
        config.dispatch.enforce_transitions = true;
    }

    config::validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;

    printhub::telemetry::init(&config.logging).context("failed to initialise logging")?;

    let db_path = match &config.database.path {
        Some(path) => path.clone(),
        None => db::default_database_path().context("could not determine home directory")?,
    };
    let database = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let blobs = Arc::new(FileBlobStore::new(&config.storage.upload_dir));
    let policy = TransitionPolicy::from_enforce_flag(config.dispatch.enforce_transitions);
    info!(
        database = %db_path.display(),
        uploads = %config.storage.upload_dir.display(),
        ?policy,
        "Starting PrintHub"
    );

    let state = AppState::new(
        OrderIntake::new(database.clone(), blobs),
        JobDispatcher::new(database, policy),
    );

    printhub::serve(state, &config.server)
        .await
        .context("server terminated with an error")
}
