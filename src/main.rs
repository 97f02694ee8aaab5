mod api;
mod backend;
mod config;
mod error;
mod poller;
mod schedule;
mod state;
mod types;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::Result;
use crate::poller::{JobEventPoller, MarketStatusPoller, SchedulerPoller};
use crate::schedule::PresetCatalog;
use crate::state::SnapshotStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Preset catalog ---
    let catalog = match &cfg.catalog_path {
        Some(path) => PresetCatalog::from_file(path)?,
        None => PresetCatalog::builtin(),
    };
    info!(
        presets = catalog.len(),
        source = cfg.catalog_path.as_deref().unwrap_or("builtin"),
        reference_tz = cfg.reference_tz.name(),
        display_tz = cfg.display_tz.name(),
        "Preset catalog loaded"
    );
    if catalog.is_empty() {
        warn!("Preset catalog is empty; every backend job will be listed as custom");
    }

    for drift in catalog.cron_drift(cfg.reference_tz, Utc::now()) {
        warn!(
            preset = %drift.preset_id,
            configured = %drift.configured,
            expected = %drift.expected,
            "Cron for \"{}\" no longer fires at its reference time",
            drift.name,
        );
    }

    // --- Shared state ---
    let store = SnapshotStore::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let backend = BackendClient::new(&cfg, Arc::clone(&latency))?;
    info!("Polling backend at {}", cfg.backend_url);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // --- Spawn pollers ---

    // Jobs, run history, collectors (every 30s)
    let scheduler = SchedulerPoller::new(
        backend.clone(),
        Arc::clone(&store),
        Arc::clone(&health),
        cfg.history_days,
    );
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    // Market status (every 10s)
    let market = MarketStatusPoller::new(backend.clone(), Arc::clone(&store), Arc::clone(&health));
    let market_task = tokio::spawn(market.run(shutdown_rx.clone()));

    // Job events (every 5s)
    let events = JobEventPoller::new(backend.clone(), Arc::clone(&store), Arc::clone(&health));
    let events_task = tokio::spawn(events.run(shutdown_rx));

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        health,
        latency,
        catalog: Arc::new(catalog),
        backend,
        reference_tz: cfg.reference_tz,
        display_tz: cfg.display_tz,
        horizon_hours: cfg.horizon_hours,
        started_at: Utc::now(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
            }
            info!("Shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for task in [scheduler_task, market_task, events_task] {
        if let Err(e) = task.await {
            warn!("Poller task ended abnormally: {e}");
        }
    }
    info!("Stopped");

    Ok(())
}
