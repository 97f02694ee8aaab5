use chrono_tz::Tz;

use crate::error::{AppError, Result};
use crate::schedule::timezone::parse_zone;

pub const BACKEND_API_URL: &str = "http://localhost:8000";

/// Exchange-local zone in which preset schedules are authored.
pub const REFERENCE_TZ: &str = "America/New_York";

/// Scheduler data (jobs, run history, collectors) poll interval (seconds).
pub const SCHEDULER_POLL_INTERVAL_SECS: u64 = 30;

/// Market status poll interval (seconds).
pub const MARKET_STATUS_POLL_INTERVAL_SECS: u64 = 10;

/// Job event notification poll interval (seconds).
pub const JOB_EVENTS_POLL_INTERVAL_SECS: u64 = 5;

/// Forward window for the upcoming-runs timeline (hours).
pub const DEFAULT_HORIZON_HOURS: u32 = 48;

/// Upper bound accepted for a caller-supplied horizon (one week).
pub const MAX_HORIZON_HOURS: u32 = 168;

/// Days of run history requested from the backend.
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Per-day rows kept in a run history summary, most recent first.
pub const HISTORY_BREAKDOWN_DAYS: usize = 7;

/// Job events kept in memory for the dashboard feed.
pub const MAX_RECENT_EVENTS: usize = 50;

/// Timeout applied to every backend request (seconds).
pub const BACKEND_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    /// Forwarded as a bearer token when set (BACKEND_API_TOKEN). Never logged.
    pub backend_token: Option<String>,
    pub log_level: String,
    pub api_port: u16,
    /// Zone the presets are authored in (REFERENCE_TZ)
    pub reference_tz: Tz,
    /// Zone the viewer sees times in (DISPLAY_TZ)
    pub display_tz: Tz,
    /// Timeline horizon in hours (TIMELINE_HORIZON_HOURS)
    pub horizon_hours: u32,
    /// Days of run history to request (HISTORY_DAYS)
    pub history_days: u32,
    /// Optional JSON file replacing the built-in preset catalog (PRESET_CATALOG_PATH)
    pub catalog_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let reference_tz = parse_zone(
            &std::env::var("REFERENCE_TZ").unwrap_or_else(|_| REFERENCE_TZ.to_string()),
        )?;
        let display_tz =
            parse_zone(&std::env::var("DISPLAY_TZ").unwrap_or_else(|_| "UTC".to_string()))?;

        let horizon_hours = std::env::var("TIMELINE_HORIZON_HOURS")
            .unwrap_or_else(|_| DEFAULT_HORIZON_HOURS.to_string())
            .parse::<u32>()
            .map_err(|_| {
                AppError::Config("TIMELINE_HORIZON_HOURS must be a positive integer".to_string())
            })?;
        if horizon_hours == 0 || horizon_hours > MAX_HORIZON_HOURS {
            return Err(AppError::Config(format!(
                "TIMELINE_HORIZON_HOURS must be between 1 and {MAX_HORIZON_HOURS}"
            )));
        }

        Ok(Self {
            backend_url: std::env::var("BACKEND_API_URL")
                .unwrap_or_else(|_| BACKEND_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            backend_token: std::env::var("BACKEND_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            reference_tz,
            display_tz,
            horizon_hours,
            history_days: std::env::var("HISTORY_DAYS")
                .unwrap_or_else(|_| DEFAULT_HISTORY_DAYS.to_string())
                .parse::<u32>()
                .unwrap_or(DEFAULT_HISTORY_DAYS),
            catalog_path: std::env::var("PRESET_CATALOG_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        })
    }
}
