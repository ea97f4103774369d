//! Chess puzzle mining worker
//!
//! Drains game jobs from the ingestion queue, replays each game against a
//! UCI engine, and persists the tactical puzzles it finds.

mod config;
mod db;
mod error;
mod job;
mod queue;
mod worker;

use tokio::sync::watch;
use tracing::info;

use crate::config::WorkerConfig;
use crate::db::PuzzleStore;
use crate::queue::QueueClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::load()?;

    let default_level = if config.is_development() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    info!(
        queue = %config.game_ingestion_queue,
        workers = config.worker_count,
        engine = %config.engine_path,
        "starting puzzle mining"
    );

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.puzzle_db_connection_string)
        .await?;
    info!("Database connection established");

    let queue = QueueClient::new(&config).await?;
    info!("Queue client ready");

    let store = PuzzleStore::new(pool);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let workers: Vec<_> = (0..config.worker_count)
        .map(|worker_id| {
            tokio::spawn(worker::run(
                worker_id,
                queue.clone(),
                store.clone(),
                config.clone(),
                shutdown_rx.clone(),
            ))
        })
        .collect();

    wait_for_signal().await?;
    info!("shutdown signal received, draining workers");
    let _ = shutdown_tx.send(true);
    for handle in workers {
        let _ = handle.await;
    }
    info!("all workers stopped");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
