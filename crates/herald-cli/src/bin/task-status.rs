//! task-status - tidfile に記録したタスクの現在の状態を問い合わせる

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use herald_core::app::Settings;
use herald_core::impls::{FileTrackingStore, RedisBroker};
use herald_core::ports::{TaskBroker, TrackingStore};

/// Print `<task id> <queue> <state>` for a task recorded by `send-task -f`.
#[derive(Parser, Debug)]
#[command(name = "task-status", version)]
struct Cli {
    /// Tracking file written by send-task
    tidfile: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("HERALD_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let record = FileTrackingStore::new(&cli.tidfile)
        .load()
        .await
        .context("failed to load tracking record")?;
    let settings = Settings::from_env()?;

    let broker = RedisBroker::connect(&settings.broker_url, &settings.result_backend)
        .await
        .context("failed to connect to broker")?;
    let state = broker
        .get_state(&record.task_id)
        .await
        .with_context(|| format!("failed to query state of {}", record.task_id))?;

    tracing::debug!(confirmed_at = %record.confirmed_at, "tracking record loaded");
    println!("{} {} {}", record.task_id, record.queue_name, state);
    Ok(())
}
