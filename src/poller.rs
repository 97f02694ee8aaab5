use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join3;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::health::{HealthState, PollSource};
use crate::backend::BackendClient;
use crate::config::{
    JOB_EVENTS_POLL_INTERVAL_SECS, MARKET_STATUS_POLL_INTERVAL_SECS, SCHEDULER_POLL_INTERVAL_SECS,
};
use crate::error::Result;
use crate::state::SnapshotStore;

/// Tick `poll` every `period` until `shutdown` flips. The first tick fires
/// immediately so the store is populated at startup.
async fn poll_loop<F, Fut>(
    source: PollSource,
    period: Duration,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
    mut poll: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut ticker = interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                debug!(%source, "poller stopping");
                return;
            }
        }

        match poll().await {
            Ok(()) => health.record_success(source, Utc::now()),
            Err(e) => {
                error!(%source, "poll failed: {e}");
                health.record_failure(source, e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SchedulerPoller
// ---------------------------------------------------------------------------

/// Jobs, run history and collector health; the three are fetched together
/// every 30 seconds.
pub struct SchedulerPoller {
    backend: BackendClient,
    store: Arc<SnapshotStore>,
    health: Arc<HealthState>,
    history_days: u32,
}

impl SchedulerPoller {
    pub fn new(
        backend: BackendClient,
        store: Arc<SnapshotStore>,
        health: Arc<HealthState>,
        history_days: u32,
    ) -> Self {
        Self { backend, store, health, history_days }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = &self;
        poll_loop(
            PollSource::Scheduler,
            Duration::from_secs(SCHEDULER_POLL_INTERVAL_SECS),
            Arc::clone(&self.health),
            shutdown,
            move || this.refresh(),
        )
        .await;
    }

    async fn refresh(&self) -> Result<()> {
        let (jobs, history, collectors) = join3(
            self.backend.fetch_jobs(),
            self.backend.fetch_history(self.history_days),
            self.backend.fetch_collectors(),
        )
        .await;

        // Jobs drive everything else; a failed history or collectors fetch
        // keeps the previous snapshot for that part.
        let (jobs, stats) = jobs?;
        if stats.rejected > 0 {
            warn!(
                rejected = stats.rejected,
                total = stats.api_total,
                "skipped malformed scheduled jobs"
            );
        }
        let job_count = jobs.len();
        self.store.replace_jobs(jobs);

        match history {
            Ok(h) => self.store.replace_history(h),
            Err(e) => warn!("run history fetch failed, keeping previous: {e}"),
        }
        match collectors {
            Ok((c, _)) => self.store.replace_collectors(c),
            Err(e) => warn!("collector health fetch failed, keeping previous: {e}"),
        }

        debug!(jobs = job_count, "scheduler snapshot refreshed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MarketStatusPoller
// ---------------------------------------------------------------------------

pub struct MarketStatusPoller {
    backend: BackendClient,
    store: Arc<SnapshotStore>,
    health: Arc<HealthState>,
}

impl MarketStatusPoller {
    pub fn new(backend: BackendClient, store: Arc<SnapshotStore>, health: Arc<HealthState>) -> Self {
        Self { backend, store, health }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = &self;
        poll_loop(
            PollSource::MarketStatus,
            Duration::from_secs(MARKET_STATUS_POLL_INTERVAL_SECS),
            Arc::clone(&self.health),
            shutdown,
            move || this.refresh(),
        )
        .await;
    }

    async fn refresh(&self) -> Result<()> {
        let status = self.backend.fetch_market_status().await?;
        let was_open = self.store.market().map(|m| m.is_open);
        if was_open.is_some_and(|w| w != status.is_open) {
            info!(is_open = status.is_open, "market open state changed");
        }
        self.store.replace_market(status);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JobEventPoller
// ---------------------------------------------------------------------------

/// Polls job start/finish notifications and logs each new one.
pub struct JobEventPoller {
    backend: BackendClient,
    store: Arc<SnapshotStore>,
    health: Arc<HealthState>,
}

impl JobEventPoller {
    pub fn new(backend: BackendClient, store: Arc<SnapshotStore>, health: Arc<HealthState>) -> Self {
        Self { backend, store, health }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let this = &self;
        poll_loop(
            PollSource::JobEvents,
            Duration::from_secs(JOB_EVENTS_POLL_INTERVAL_SECS),
            Arc::clone(&self.health),
            shutdown,
            move || this.drain(),
        )
        .await;
    }

    async fn drain(&self) -> Result<()> {
        let since = self.store.latest_event_timestamp();
        let (events, _) = self.backend.fetch_events(since.as_deref()).await?;
        for event in self.store.push_events(events) {
            info!(
                job_id = %event.job_id,
                job_name = %event.job_name,
                event = %event.event,
                "job {}: {}",
                event.event,
                event.message.as_deref().unwrap_or(&event.job_name),
            );
        }
        Ok(())
    }
}
