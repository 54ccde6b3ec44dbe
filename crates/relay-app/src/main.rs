//! relay-sync - Relayer event synchronization tooling
//!
//! `replay` drives a session from a recorded event log and prints the
//! resulting price cache, order book and task progress.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_app::replay::{self, Replayer};
use relay_app::{AppConfig, InMemoryStore, JsonFileStore, KeyValueStore, Session};
use relay_bus::InMemoryRelayer;
use relay_feed::LogNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Relayer event synchronization tooling
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_SYNC_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON Lines event log through a fresh session
    Replay {
        /// Event log path
        file: PathBuf,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    relay_telemetry::init_logging()?;
    info!("Starting relay-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::ShowConfig => {
            println!("{}", config.to_toml()?);
        }
        Command::Replay { file } => {
            let (records, skipped) = replay::read_log(&file)?;
            info!(path = %file.display(), records = records.len(), skipped, "Event log loaded");

            let store: Arc<dyn KeyValueStore> = match &config.storage.path {
                Some(path) => Arc::new(JsonFileStore::open(path)?),
                None => Arc::new(InMemoryStore::new()),
            };

            let relayer = Arc::new(InMemoryRelayer::new());
            let mut session =
                Session::new(&config, relayer.clone(), Box::new(LogNotifier::new()), store)?;
            session.start().await;

            let mut replayer = Replayer::new(relayer);
            let summary = replayer.run(&session, &records, skipped).await;
            replayer.finish();
            session.shutdown().await;

            let rendered =
                serde_json::to_string_pretty(&summary).context("Failed to render summary")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
