use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthState, PollHealth, PollSource};
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::backend::BackendClient;
use crate::config::MAX_HORIZON_HOURS;
use crate::error::AppError;
use crate::schedule::catalog::upcoming_reference_runs;
use crate::schedule::history::{per_job_summary, summarize, JobRunSummary};
use crate::schedule::market_clock::{badge, countdown, MarketBadge, MarketCountdown};
use crate::schedule::matcher::{unmatched_jobs, JobAction};
use crate::schedule::timezone::{convert_reference_time, format_in_zone, reference_instant};
use crate::schedule::{build_timeline, reconcile, ClassificationStrategy, PresetCatalog};
use crate::state::SnapshotStore;
use crate::types::{
    CollectorHealthRecord, JobEvent, MarketStatus, PresetSchedule, RunHistorySummary,
    ScheduledJob, TimelineEvent,
};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SnapshotStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub catalog: Arc<PresetCatalog>,
    pub backend: BackendClient,
    pub reference_tz: Tz,
    pub display_tz: Tz,
    pub horizon_hours: u32,
    pub started_at: DateTime<Utc>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/presets", get(get_presets))
        .route("/schedule/reconciled", get(get_reconciled))
        .route("/schedule/timeline", get(get_timeline))
        .route("/schedule/history", get(get_history))
        .route("/market/clock", get(get_market_clock))
        .route("/collectors", get(get_collectors))
        .route("/events", get(get_events))
        .route("/convert", get(get_convert))
        .route("/jobs/:id/run", post(post_run))
        .route("/jobs/:id/enable", post(post_enable))
        .route("/jobs/:id/disable", post(post_disable))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TimelineQuery {
    pub horizon_hours: Option<u32>,
    pub strategy: Option<String>,
}

#[derive(Deserialize)]
pub struct ConvertQuery {
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// Display zone; defaults to the configured one.
    pub zone: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: i64,
    pub pollers: BTreeMap<String, PollHealth>,
    pub jobs: usize,
    pub recent_events: usize,
}

#[derive(Serialize)]
pub struct PresetView {
    #[serde(flatten)]
    pub preset: PresetSchedule,
    /// Reference time rendered in the display zone, `HH:MM`.
    pub display_time: String,
    pub display_zone: &'static str,
}

#[derive(Serialize)]
pub struct ReconciledView {
    pub preset: PresetView,
    pub configured: bool,
    pub job: Option<ScheduledJob>,
    pub actions: Vec<JobAction>,
    /// Projected runs for presets with no backend job yet.
    pub preview_runs: Vec<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ReconciledResponse {
    pub presets: Vec<ReconciledView>,
    pub custom_jobs: Vec<ScheduledJob>,
}

#[derive(Serialize)]
pub struct TimelineResponse {
    pub generated_at: DateTime<Utc>,
    pub horizon_hours: u32,
    pub strategy: String,
    pub display_zone: &'static str,
    pub events: Vec<TimelineEvent>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub summary: RunHistorySummary,
    pub per_job: Vec<JobRunSummary>,
}

#[derive(Serialize)]
pub struct MarketClockResponse {
    /// Current time in the display zone, `HH:MM:SS`.
    pub display_time: String,
    pub display_zone: &'static str,
    pub status: Option<MarketStatus>,
    pub badge: Option<MarketBadge>,
    pub countdown: Option<MarketCountdown>,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    pub reference_zone: &'static str,
    pub reference_time: String,
    pub display_zone: String,
    pub display_time: String,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub overall: LatencySummary,
    pub endpoints: BTreeMap<&'static str, LatencySummary>,
}

#[derive(Serialize)]
pub struct ActionResponse {
    pub job_id: String,
    pub action: JobAction,
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let pollers = [PollSource::Scheduler, PollSource::MarketStatus, PollSource::JobEvents]
        .into_iter()
        .map(|s| (s.to_string(), state.health.get(s)))
        .collect();

    Json(HealthResponse {
        status: if state.health.is_healthy() { "ok" } else { "degraded" },
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        pollers,
        jobs: state.store.jobs().len(),
        recent_events: state.store.recent_events().len(),
    })
}

async fn get_presets(State(state): State<ApiState>) -> Result<Json<Vec<PresetView>>, AppError> {
    let now = Utc::now();
    let views = state
        .catalog
        .presets()
        .iter()
        .map(|p| preset_view(&state, p, now))
        .collect::<Result<_, _>>()?;
    Ok(Json(views))
}

async fn get_reconciled(
    State(state): State<ApiState>,
) -> Result<Json<ReconciledResponse>, AppError> {
    let now = Utc::now();
    let jobs = state.store.jobs();
    let horizon = Duration::hours(i64::from(state.horizon_hours));

    let presets = reconcile(state.catalog.presets(), &jobs)
        .into_iter()
        .map(|r| {
            let preview_runs = if r.is_configured() {
                Vec::new()
            } else {
                upcoming_reference_runs(&r.preset.reference_time, state.reference_tz, now, horizon)
            };
            Ok(ReconciledView {
                preset: preset_view(&state, r.preset, now)?,
                configured: r.is_configured(),
                job: r.job.cloned(),
                actions: r.available_actions(),
                preview_runs,
            })
        })
        .collect::<Result<_, AppError>>()?;

    let custom_jobs = unmatched_jobs(state.catalog.presets(), &jobs)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ReconciledResponse { presets, custom_jobs }))
}

async fn get_timeline(
    State(state): State<ApiState>,
    Query(params): Query<TimelineQuery>,
) -> Result<Json<TimelineResponse>, AppError> {
    let horizon_hours = params.horizon_hours.unwrap_or(state.horizon_hours);
    if horizon_hours == 0 || horizon_hours > MAX_HORIZON_HOURS {
        return Err(AppError::InvalidParameter(format!(
            "horizon_hours must be between 1 and {MAX_HORIZON_HOURS}"
        )));
    }
    let strategy = match params.strategy.as_deref() {
        Some(s) => s.parse::<ClassificationStrategy>()?,
        None => ClassificationStrategy::default(),
    };

    let now = Utc::now();
    let classifier = strategy.classifier(state.reference_tz);
    let events = build_timeline(&state.store.jobs(), now, horizon_hours, classifier.as_ref());

    Ok(Json(TimelineResponse {
        generated_at: now,
        horizon_hours,
        strategy: strategy.to_string(),
        display_zone: state.display_tz.name(),
        events,
    }))
}

async fn get_history(State(state): State<ApiState>) -> Json<HistoryResponse> {
    let history = state.store.history();
    Json(HistoryResponse {
        summary: summarize(&history.history),
        per_job: per_job_summary(&history.history),
    })
}

async fn get_market_clock(State(state): State<ApiState>) -> Json<MarketClockResponse> {
    let now = Utc::now();
    let status = state.store.market();
    Json(MarketClockResponse {
        display_time: format_in_zone(now, state.display_tz, "%H:%M:%S"),
        display_zone: state.display_tz.name(),
        badge: status.as_deref().map(badge),
        countdown: status.as_deref().and_then(|s| countdown(s, now)),
        status: status.as_deref().cloned(),
    })
}

async fn get_collectors(State(state): State<ApiState>) -> Json<Vec<CollectorHealthRecord>> {
    let now = Utc::now();
    let records = state
        .store
        .collectors()
        .iter()
        .map(|c| CollectorHealthRecord::from_backend(c, now))
        .collect();
    Json(records)
}

async fn get_events(State(state): State<ApiState>) -> Json<Vec<JobEvent>> {
    Json(state.store.recent_events())
}

async fn get_convert(
    State(state): State<ApiState>,
    Query(params): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, AppError> {
    let display_zone = params
        .zone
        .unwrap_or_else(|| state.display_tz.name().to_string());
    let display_time = convert_reference_time(
        Utc::now(),
        params.hour,
        params.minute,
        state.reference_tz.name(),
        &display_zone,
    )?;

    Ok(Json(ConvertResponse {
        reference_zone: state.reference_tz.name(),
        reference_time: format!("{:02}:{:02}", params.hour, params.minute),
        display_zone,
        display_time,
    }))
}

async fn post_run(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    job_action(state, job_id, JobAction::Run).await
}

async fn post_enable(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    job_action(state, job_id, JobAction::Enable).await
}

async fn post_disable(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    job_action(state, job_id, JobAction::Disable).await
}

/// Forward the action to the backend, then patch the snapshot so the UI
/// reflects it before the next scheduler poll.
async fn job_action(
    state: ApiState,
    job_id: String,
    action: JobAction,
) -> Result<Json<ActionResponse>, AppError> {
    if state.store.job(&job_id).is_none() {
        return Err(AppError::JobNotFound(job_id));
    }

    state.backend.job_action(&job_id, action).await?;

    match action {
        JobAction::Run => state.store.mark_job_running(&job_id),
        JobAction::Enable => state.store.set_job_enabled(&job_id, true),
        JobAction::Disable => state.store.set_job_enabled(&job_id, false),
    };

    Ok(Json(ActionResponse {
        job_id,
        action,
        accepted: true,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        overall: state.latency.summary(),
        endpoints: state.latency.by_endpoint(),
    })
}

fn preset_view(
    state: &ApiState,
    preset: &PresetSchedule,
    now: DateTime<Utc>,
) -> Result<PresetView, AppError> {
    let rt = &preset.reference_time;
    let at = reference_instant(now, rt.hour, rt.minute, state.reference_tz)?;
    Ok(PresetView {
        preset: preset.clone(),
        display_time: format_in_zone(at, state.display_tz, "%H:%M"),
        display_zone: state.display_tz.name(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
