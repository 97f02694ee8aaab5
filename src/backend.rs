use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::api::latency::LatencyStats;
use crate::config::{Config, BACKEND_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::schedule::matcher::JobAction;
use crate::types::{CollectorHealth, JobEvent, MarketStatus, RunHistory, ScheduledJob};

const JOBS_PATH: &str = "/api/v1/admin/scheduler/jobs";
const HISTORY_PATH: &str = "/api/v1/admin/scheduler/jobs/history";
const EVENTS_PATH: &str = "/api/v1/admin/scheduler/events";
const COLLECTORS_PATH: &str = "/api/v1/admin/collectors/health";
const MARKET_STATUS_PATH: &str = "/api/v1/market/status";
/// Latency label shared by run/enable/disable.
const JOB_ACTION_LABEL: &str = "/api/v1/admin/scheduler/jobs/:id/action";

/// How many list entries were usable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub api_total: usize,
    pub rejected: usize,
}

/// Thin REST client for the sentiment backend's admin API.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    latency: Arc<LatencyStats>,
}

impl BackendClient {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.backend_url.clone(),
            token: cfg.backend_token.clone(),
            latency,
        })
    }

    pub async fn fetch_jobs(&self) -> Result<(Vec<ScheduledJob>, FetchStats)> {
        let resp = self.get_json(JOBS_PATH, &[]).await?;
        parse_list(&resp, "jobs")
    }

    pub async fn fetch_history(&self, days: u32) -> Result<RunHistory> {
        let resp = self.get_json(HISTORY_PATH, &[("days", days.to_string())]).await?;
        Ok(serde_json::from_value(resp)?)
    }

    pub async fn fetch_collectors(&self) -> Result<(Vec<CollectorHealth>, FetchStats)> {
        let resp = self.get_json(COLLECTORS_PATH, &[]).await?;
        parse_list(&resp, "collectors")
    }

    pub async fn fetch_market_status(&self) -> Result<MarketStatus> {
        let resp = self.get_json(MARKET_STATUS_PATH, &[]).await?;
        parse_object(resp)
    }

    /// Events newer than `since` (the newest timestamp already seen).
    pub async fn fetch_events(&self, since: Option<&str>) -> Result<(Vec<JobEvent>, FetchStats)> {
        let query: Vec<(&str, String)> = since.map(|s| ("since", s.to_string())).into_iter().collect();
        let resp = self.get_json(EVENTS_PATH, &query).await?;
        parse_list(&resp, "events")
    }

    /// Trigger a run, enable, or disable on the backend.
    pub async fn job_action(&self, job_id: &str, action: JobAction) -> Result<()> {
        let verb = match action {
            JobAction::Run => "run",
            JobAction::Enable => "enable",
            JobAction::Disable => "disable",
        };
        let path = format!("{JOBS_PATH}/{job_id}/{verb}");
        let url = format!("{}{}", self.base_url, path);

        let started = Instant::now();
        let resp = self.authorize(self.client.post(&url)).send().await;
        self.latency.record(JOB_ACTION_LABEL, started.elapsed());
        let resp = resp?;

        match resp.status() {
            s if s.is_success() => {
                info!(job_id, action = verb, "job action accepted by backend");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(AppError::JobNotFound(job_id.to_string())),
            s => Err(AppError::Backend(format!("POST {path} returned {s}"))),
        }
    }

    async fn get_json(&self, path: &'static str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);

        let started = Instant::now();
        let resp = self.authorize(self.client.get(&url).query(query)).send().await;
        self.latency.record(path, started.elapsed());
        let resp = resp?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Backend(format!("GET {path} returned {status}")));
        }
        debug!(path, %status, "backend response");
        Ok(resp.json().await?)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Accept either a bare array or an object wrapping it under `key`
/// (or `data`). Entries that fail to deserialize are skipped and counted.
pub fn parse_list<T: DeserializeOwned>(
    resp: &serde_json::Value,
    key: &str,
) -> Result<(Vec<T>, FetchStats)> {
    let items = resp
        .as_array()
        .or_else(|| resp.get(key).and_then(|v| v.as_array()))
        .or_else(|| resp.get("data").and_then(|v| v.as_array()))
        .ok_or_else(|| AppError::Backend(format!("{key} response was not a list")))?;

    let mut stats = FetchStats {
        api_total: items.len(),
        ..FetchStats::default()
    };
    let parsed = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                stats.rejected += 1;
                debug!(key, "skipping malformed entry: {e}");
                None
            }
        })
        .collect();
    Ok((parsed, stats))
}

/// Accept an object either bare or wrapped under `data`.
fn parse_object<T: DeserializeOwned>(resp: serde_json::Value) -> Result<T> {
    let inner = match resp {
        serde_json::Value::Object(ref map) if map.contains_key("data") => map["data"].clone(),
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}
