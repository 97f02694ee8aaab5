use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ratatui::style::Color;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarketBadge {
    pub label: String,
    pub color: String,
    pub period: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketCountdown {
    pub display: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarketClockResponse {
    pub display_time: String,
    pub display_zone: String,
    pub badge: Option<MarketBadge>,
    pub countdown: Option<MarketCountdown>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetView {
    pub name: String,
    pub display_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub enabled: bool,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciledRow {
    pub preset: PresetView,
    pub job: Option<JobView>,
    pub actions: Vec<String>,
}

impl ReconciledRow {
    pub fn can(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReconciledResponse {
    pub presets: Vec<ReconciledRow>,
    pub custom_jobs: Vec<JobView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineRow {
    pub job_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub session_label: String,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TimelineResponse {
    pub horizon_hours: u32,
    pub strategy: String,
    pub display_zone: String,
    pub events: Vec<TimelineRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRow {
    pub job_name: String,
    pub event: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistorySummary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub avg_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryResponse {
    pub summary: HistorySummary,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

pub const STRATEGIES: [&str; 3] = ["keyword", "hour-window", "hour-window-precise"];

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub clock: MarketClockResponse,
    pub reconciled: ReconciledResponse,
    pub timeline: TimelineResponse,
    pub events: Vec<EventRow>,
    pub history: HistoryResponse,
    /// Index into STRATEGIES used for the timeline request.
    pub strategy: usize,
    /// Result of the last job action, shown in the footer.
    pub flash: Option<String>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            clock: MarketClockResponse::default(),
            reconciled: ReconciledResponse::default(),
            timeline: TimelineResponse::default(),
            events: Vec::new(),
            history: HistoryResponse::default(),
            strategy: 0,
            flash: None,
            base_url,
        }
    }

    pub fn cycle_strategy(&mut self) {
        self.strategy = (self.strategy + 1) % STRATEGIES.len();
    }

    pub fn display_zone(&self) -> Tz {
        self.timeline.display_zone.parse().unwrap_or(Tz::UTC)
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let clock_url = format!("{}/market/clock", self.base_url);
        let reconciled_url = format!("{}/schedule/reconciled", self.base_url);
        let timeline_url = format!(
            "{}/schedule/timeline?strategy={}",
            self.base_url, STRATEGIES[self.strategy]
        );
        let events_url = format!("{}/events", self.base_url);
        let history_url = format!("{}/schedule/history", self.base_url);

        let (clock_res, reconciled_res, timeline_res, events_res, history_res) = tokio::join!(
            client.get(&clock_url).send(),
            client.get(&reconciled_url).send(),
            client.get(&timeline_url).send(),
            client.get(&events_url).send(),
            client.get(&history_url).send(),
        );

        let (clock_res, reconciled_res, timeline_res) = match (clock_res, reconciled_res, timeline_res) {
            (Ok(c), Ok(r), Ok(t)) => (c, r, t),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        let (clock, reconciled, timeline) = tokio::join!(
            clock_res.json::<MarketClockResponse>(),
            reconciled_res.json::<ReconciledResponse>(),
            timeline_res.json::<TimelineResponse>(),
        );

        match (clock, reconciled, timeline) {
            (Ok(c), Ok(r), Ok(t)) => {
                self.clock = c;
                self.reconciled = r;
                self.timeline = t;
                self.status = ConnectionStatus::Connected;

                if let Ok(e) = events_res {
                    if let Ok(events) = e.json::<Vec<EventRow>>().await {
                        self.events = events;
                    }
                }
                if let Ok(h) = history_res {
                    if let Ok(history) = h.json::<HistoryResponse>().await {
                        self.history = history;
                    }
                }
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }

    /// POST a job action for the selected preset row. Not-configured rows
    /// offer no actions and are left alone.
    pub async fn act(&mut self, client: &reqwest::Client, row: usize, action: &str) {
        let Some(entry) = self.reconciled.presets.get(row) else {
            return;
        };
        let Some(job) = entry.job.as_ref().filter(|_| entry.can(action)) else {
            self.flash = Some(format!("{}: {action} not available", entry.preset.name));
            return;
        };

        let url = format!("{}/jobs/{}/{action}", self.base_url, job.job_id);
        let name = entry.preset.name.clone();
        self.flash = Some(match client.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => format!("{name}: {action} ok"),
            Ok(resp) => format!("{name}: {action} failed ({})", resp.status()),
            Err(e) => format!("{name}: {action} failed ({e})"),
        });
        self.refresh(client).await;
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `#rrggbb` to a terminal colour; anything else renders white.
pub fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Color::White;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

/// `Sat 14:00` in the given zone.
pub fn format_slot(at: DateTime<Utc>, zone: Tz) -> String {
    at.with_timezone(&zone).format("%a %H:%M").to_string()
}

pub fn format_avg_seconds(v: Option<f64>) -> String {
    match v {
        Some(s) if s >= 60.0 => format!("{:.1}m", s / 60.0),
        Some(s) => format!("{s:.1}s"),
        None => "—".to_string(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
