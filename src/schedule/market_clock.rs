//! Formatting for the backend's market status.
//!
//! The backend is the authority on whether the market is open and when it
//! next opens/closes. Nothing here second-guesses it; we only turn its
//! instants into a badge and a countdown.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::schedule::timeline::parse_instant;
use crate::types::MarketStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownKind {
    Opens,
    Closes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketCountdown {
    pub kind: CountdownKind,
    pub target: DateTime<Utc>,
    pub remaining_seconds: i64,
    /// "Closes in 2h 15m"
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketBadge {
    pub label: &'static str,
    pub color: &'static str,
    pub period: String,
}

pub fn badge(status: &MarketStatus) -> MarketBadge {
    let (label, color) = if status.is_open {
        ("OPEN", "#10b981")
    } else {
        ("CLOSED", "#ef4444")
    };
    MarketBadge {
        label,
        color,
        period: period_label(status.current_period.as_deref()).to_string(),
    }
}

/// Countdown to the next close (open market) or next open (closed market).
///
/// `None` when the relevant instant is missing, unparsable or not in the
/// future; the backend will send a fresh one on the next poll.
pub fn countdown(status: &MarketStatus, now: DateTime<Utc>) -> Option<MarketCountdown> {
    let (kind, raw) = if status.is_open {
        (CountdownKind::Closes, status.next_close.as_deref()?)
    } else {
        (CountdownKind::Opens, status.next_open.as_deref()?)
    };
    let target = parse_instant(raw)?;
    let remaining = target - now;
    if remaining <= Duration::zero() {
        return None;
    }

    let verb = match kind {
        CountdownKind::Opens => "Opens in",
        CountdownKind::Closes => "Closes in",
    };
    Some(MarketCountdown {
        kind,
        target,
        remaining_seconds: remaining.num_seconds(),
        display: format!("{verb} {}", format_countdown(remaining)),
    })
}

/// Two most significant units: `1d 2h`, `2h 15m`, `4m 09s`, `12s`.
pub fn format_countdown(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let mins = (secs % 3_600) / 60;
    let s = secs % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

pub fn period_label(period: Option<&str>) -> &'static str {
    match period.map(|p| p.to_ascii_lowercase().replace('-', "_")).as_deref() {
        Some("pre_market" | "premarket") => "Pre-Market",
        Some("regular" | "market_hours" | "open") => "Market Hours",
        Some("after_hours" | "post_market") => "After-Hours",
        Some("overnight") => "Overnight",
        Some("weekend") => "Weekend",
        Some("holiday") => "Holiday",
        Some("closed") => "Closed",
        _ => "Unknown",
    }
}
