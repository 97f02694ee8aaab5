use chrono::{DateTime, Utc};

use crate::schedule::timeline::parse_instant;
use crate::types::{CollectorHealth, CollectorHealthRecord, CollectorStatus, ItemKind};

const SOCIAL_SOURCES: &[&str] = &["reddit", "twitter", "stocktwits", "x"];

impl CollectorHealthRecord {
    pub fn from_backend(c: &CollectorHealth, now: DateTime<Utc>) -> Self {
        let status = match c.status.as_str() {
            "operational" => CollectorStatus::Success,
            "error" => CollectorStatus::Failed,
            _ => CollectorStatus::Unknown,
        };
        Self {
            name: c.name.clone(),
            status,
            items_collected: c.items_collected.unwrap_or(0),
            item_kind: item_kind(&c.name, c.source.as_deref()),
            last_run_display: relative_time(c.last_run.as_deref(), now),
            error: c.error.clone(),
        }
    }
}

/// Social feeds produce posts; everything else is counted as articles.
pub fn item_kind(name: &str, source: Option<&str>) -> ItemKind {
    let is_social = [Some(name), source].into_iter().flatten().any(|s| {
        s.to_lowercase()
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .any(|word| SOCIAL_SOURCES.contains(&word))
    });
    if is_social {
        ItemKind::Posts
    } else {
        ItemKind::Articles
    }
}

pub fn relative_time(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = raw else {
        return "Never".to_string();
    };
    let Some(at) = parse_instant(raw) else {
        return "Unknown".to_string();
    };
    let secs = (now - at).num_seconds();
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn collector(name: &str, status: &str, last_run: Option<&str>) -> CollectorHealth {
        CollectorHealth {
            name: name.to_string(),
            status: status.to_string(),
            items_collected: Some(42),
            last_run: last_run.map(str::to_string),
            error: None,
            source: None,
        }
    }

    #[test]
    fn status_mapping() {
        let now = Utc::now();
        let rec = |s| CollectorHealthRecord::from_backend(&collector("News", s, None), now).status;
        assert_eq!(rec("operational"), CollectorStatus::Success);
        assert_eq!(rec("error"), CollectorStatus::Failed);
        assert_eq!(rec("degraded"), CollectorStatus::Unknown);
        assert_eq!(rec(""), CollectorStatus::Unknown);
    }

    #[test]
    fn items_are_bucketed_by_name() {
        assert_eq!(item_kind("Reddit Collector", None), ItemKind::Posts);
        assert_eq!(item_kind("StockTwits", None), ItemKind::Posts);
        assert_eq!(item_kind("X / Twitter", None), ItemKind::Posts);
        assert_eq!(item_kind("FinViz News", None), ItemKind::Articles);
        assert_eq!(item_kind("Marketaux", None), ItemKind::Articles);
        assert_eq!(item_kind("Collector 3", Some("reddit")), ItemKind::Posts);
    }

    #[test]
    fn last_run_is_relative() {
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        assert_eq!(relative_time(None, now), "Never");
        assert_eq!(relative_time(Some("garbage"), now), "Unknown");
        assert_eq!(relative_time(Some("2026-10-15T11:59:30Z"), now), "just now");
        assert_eq!(relative_time(Some("2026-10-15T11:55:00Z"), now), "5m ago");
        assert_eq!(relative_time(Some("2026-10-15T09:00:00Z"), now), "3h ago");
        assert_eq!(relative_time(Some("2026-10-13T12:00:00"), now), "2d ago");
    }

    #[test]
    fn record_carries_count_and_error() {
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let mut c = collector("Reddit", "error", Some("2026-10-15T11:00:00Z"));
        c.error = Some("rate limited".to_string());
        let rec = CollectorHealthRecord::from_backend(&c, now);
        assert_eq!(rec.items_collected, 42);
        assert_eq!(rec.item_kind, ItemKind::Posts);
        assert_eq!(rec.last_run_display, "1h ago");
        assert_eq!(rec.error.as_deref(), Some("rate limited"));
    }
}
