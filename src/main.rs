//! # Fleet Monitor Entry Point
//!
//! `serve` runs the HTTP API together with the retention sweep, `migrate`
//! applies database migrations and `prune` deletes availability events older
//! than a given instant.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fleet_monitor::{
    config::ConfigLoader, db, ingest::EventIngest, server::run_server, telemetry::init_tracing,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fleet-monitor", version, about = "Fleet device monitoring service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations, then serve the API and run the retention sweep (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Delete availability events created before the given instant
    Prune {
        /// RFC3339 timestamp, e.g. 2024-05-01T00:00:00Z
        #[arg(long, value_parser = parse_rfc3339)]
        before: DateTime<Utc>,
    },
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC3339 timestamp: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing telemetry")?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            db::run_migrations(&db).await?;

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                }
                signal_token.cancel();
            });

            run_server(Arc::new(config), db, shutdown).await
        }
        Command::Migrate => db::run_migrations(&db).await,
        Command::Prune { before } => {
            let (events, _) = broadcast::channel(1);
            let affected = EventIngest::new(db, events)
                .delete_before_time(before)
                .await
                .context("pruning availability events")?;
            println!("Deleted {affected} availability events created before {before}");
            Ok(())
        }
    }
}
