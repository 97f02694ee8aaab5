//! Shared health state for the /health endpoint.
//! Updated by the pollers after every attempt, read by the API.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollSource {
    Scheduler,
    MarketStatus,
    JobEvents,
}

impl std::fmt::Display for PollSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PollSource::Scheduler => "scheduler",
            PollSource::MarketStatus => "market_status",
            PollSource::JobEvents => "job_events",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

/// Per-source outcome of the most recent poll.
#[derive(Default)]
pub struct HealthState {
    polls: DashMap<PollSource, PollHealth>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, source: PollSource, at: DateTime<Utc>) {
        let mut entry = self.polls.entry(source).or_default();
        entry.last_success = Some(at);
        entry.last_error = None;
        entry.consecutive_failures = 0;
    }

    pub fn record_failure(&self, source: PollSource, error: String) {
        let mut entry = self.polls.entry(source).or_default();
        entry.last_error = Some(error);
        entry.consecutive_failures += 1;
    }

    pub fn get(&self, source: PollSource) -> PollHealth {
        self.polls
            .get(&source)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Healthy once every source has succeeded at least once and none is
    /// currently failing.
    pub fn is_healthy(&self) -> bool {
        [PollSource::Scheduler, PollSource::MarketStatus, PollSource::JobEvents]
            .into_iter()
            .map(|s| self.get(s))
            .all(|h| h.last_success.is_some() && h.consecutive_failures == 0)
    }
}
