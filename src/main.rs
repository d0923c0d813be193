//! pulsewatch - Probe Liveness Tracker
//!
//! Records heartbeat and speed-test reports from remote network probes,
//! derives an Up/Down state per probe, and detects silent failures with a
//! periodic deadline sweep.

mod config;
mod db;
mod liveness;
mod notify;
mod web;

use config::ServerConfig;
use db::Store;
use liveness::{sweeper::TimeoutSweeper, LivenessMachine};
use notify::Notifier;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pulsewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting pulsewatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Event notification pipeline
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    Notifier::start(event_rx, cfg.webhook_url.clone());
    if cfg.webhook_url.is_some() {
        tracing::info!("Webhook notifications enabled");
    }

    // Core state machine and timeout sweeper
    let machine = Arc::new(LivenessMachine::new(store.clone(), event_tx));
    let sweeper = TimeoutSweeper::new(
        store.clone(),
        machine.clone(),
        Duration::from_secs(cfg.sweep_interval_secs),
    );
    sweeper.start();
    tracing::info!("Timeout sweeper running every {}s", cfg.sweep_interval_secs);

    // Start web server
    let server = Server::new(cfg, store, machine);
    server.start().await?;

    Ok(())
}
