//! Session bucket classification.
//!
//! Two strategies coexist and callers choose one explicitly:
//!
//! - hour-window: looks at the instant's weekday and hour in a given zone.
//!   Misclassifies when the zone the job's cron runs in is not the zone used
//!   here.
//! - keyword: looks only at the job name. Stable for display, but only as
//!   good as the naming convention.
//!
//! They can disagree for the same job; neither is treated as canonical.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::AppError;
use crate::types::SessionBucket;

pub trait SessionClassifier: Send + Sync {
    fn classify(&self, job_name: &str, at: DateTime<Utc>) -> SessionBucket;
}

// ---------------------------------------------------------------------------
// Hour-window strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct HourWindowClassifier {
    pub zone: Tz,
    /// Start market hours at 09:30 instead of 09:00.
    pub precise_open: bool,
}

impl SessionClassifier for HourWindowClassifier {
    fn classify(&self, _job_name: &str, at: DateTime<Utc>) -> SessionBucket {
        let local = at.with_timezone(&self.zone);
        classify_local(local.weekday(), local.hour(), local.minute(), self.precise_open)
    }
}

/// Weekend wins over every hour window.
pub fn classify_local(day: Weekday, hour: u32, minute: u32, precise_open: bool) -> SessionBucket {
    if matches!(day, Weekday::Sat | Weekday::Sun) {
        return SessionBucket::Weekend;
    }

    let minutes = hour * 60 + minute;
    let open = if precise_open { 9 * 60 + 30 } else { 9 * 60 };

    if (7 * 60..open).contains(&minutes) {
        SessionBucket::PreMarket
    } else if (open..16 * 60).contains(&minutes) {
        SessionBucket::MarketHours
    } else if (16 * 60..20 * 60).contains(&minutes) {
        SessionBucket::AfterHours
    } else {
        SessionBucket::Overnight
    }
}

// ---------------------------------------------------------------------------
// Keyword strategy
// ---------------------------------------------------------------------------

/// Checked in order; the first table row with a matching keyword wins.
const KEYWORDS: &[(&[&str], SessionBucket)] = &[
    (&["weekend", "deep"], SessionBucket::Weekend),
    (&["pre-market", "preparation"], SessionBucket::PreMarket),
    (&["active", "trading"], SessionBucket::MarketHours),
    (&["after-hours"], SessionBucket::AfterHours),
    (&["overnight", "summary"], SessionBucket::Overnight),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl SessionClassifier for KeywordClassifier {
    fn classify(&self, job_name: &str, _at: DateTime<Utc>) -> SessionBucket {
        classify_name(job_name)
    }
}

/// Case-insensitive substring match against the keyword table; defaults to
/// overnight.
pub fn classify_name(name: &str) -> SessionBucket {
    let lower = name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, bucket)| *bucket)
        .unwrap_or(SessionBucket::Overnight)
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationStrategy {
    HourWindow,
    HourWindowPrecise,
    #[default]
    Keyword,
}

impl ClassificationStrategy {
    pub fn classifier(self, zone: Tz) -> Box<dyn SessionClassifier> {
        match self {
            ClassificationStrategy::HourWindow => Box::new(HourWindowClassifier {
                zone,
                precise_open: false,
            }),
            ClassificationStrategy::HourWindowPrecise => Box::new(HourWindowClassifier {
                zone,
                precise_open: true,
            }),
            ClassificationStrategy::Keyword => Box::new(KeywordClassifier),
        }
    }
}

impl std::str::FromStr for ClassificationStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour-window" => Ok(ClassificationStrategy::HourWindow),
            "hour-window-precise" => Ok(ClassificationStrategy::HourWindowPrecise),
            "keyword" => Ok(ClassificationStrategy::Keyword),
            other => Err(AppError::InvalidParameter(format!(
                "unknown classification strategy: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ClassificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClassificationStrategy::HourWindow => "hour-window",
            ClassificationStrategy::HourWindowPrecise => "hour-window-precise",
            ClassificationStrategy::Keyword => "keyword",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn eastern() -> Tz {
        "America/New_York".parse().unwrap()
    }

    #[test]
    fn hour_windows_on_a_weekday() {
        let d = Weekday::Wed;
        assert_eq!(classify_local(d, 6, 59, false), SessionBucket::Overnight);
        assert_eq!(classify_local(d, 7, 0, false), SessionBucket::PreMarket);
        assert_eq!(classify_local(d, 8, 59, false), SessionBucket::PreMarket);
        assert_eq!(classify_local(d, 9, 0, false), SessionBucket::MarketHours);
        assert_eq!(classify_local(d, 15, 59, false), SessionBucket::MarketHours);
        assert_eq!(classify_local(d, 16, 0, false), SessionBucket::AfterHours);
        assert_eq!(classify_local(d, 19, 59, false), SessionBucket::AfterHours);
        assert_eq!(classify_local(d, 20, 0, false), SessionBucket::Overnight);
        assert_eq!(classify_local(d, 0, 0, false), SessionBucket::Overnight);
    }

    #[test]
    fn precise_open_moves_boundary_to_half_past() {
        let d = Weekday::Mon;
        assert_eq!(classify_local(d, 9, 15, false), SessionBucket::MarketHours);
        assert_eq!(classify_local(d, 9, 15, true), SessionBucket::PreMarket);
        assert_eq!(classify_local(d, 9, 29, true), SessionBucket::PreMarket);
        assert_eq!(classify_local(d, 9, 30, true), SessionBucket::MarketHours);
    }

    #[test]
    fn weekend_takes_precedence() {
        for hour in [3, 8, 12, 17, 22] {
            assert_eq!(classify_local(Weekday::Sat, hour, 0, false), SessionBucket::Weekend);
            assert_eq!(classify_local(Weekday::Sun, hour, 0, true), SessionBucket::Weekend);
        }
    }

    #[test]
    fn hour_window_uses_the_configured_zone() {
        // Friday 2026-10-16 23:30 UTC = 19:30 EDT Friday, but Saturday in Tokyo.
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap();
        let ny = HourWindowClassifier { zone: eastern(), precise_open: false };
        let tokyo = HourWindowClassifier {
            zone: "Asia/Tokyo".parse().unwrap(),
            precise_open: false,
        };
        assert_eq!(ny.classify("anything", at), SessionBucket::AfterHours);
        assert_eq!(tokyo.classify("anything", at), SessionBucket::Weekend);
    }

    #[test]
    fn keyword_table() {
        assert_eq!(classify_name("Weekend Deep Analysis"), SessionBucket::Weekend);
        assert_eq!(classify_name("Deep Backfill"), SessionBucket::Weekend);
        assert_eq!(classify_name("Pre-Market Preparation"), SessionBucket::PreMarket);
        assert_eq!(classify_name("Morning Preparation"), SessionBucket::PreMarket);
        assert_eq!(classify_name("Active Trading Collection"), SessionBucket::MarketHours);
        assert_eq!(classify_name("After-Hours Analysis"), SessionBucket::AfterHours);
        assert_eq!(classify_name("Overnight Summary"), SessionBucket::Overnight);
        assert_eq!(classify_name("Daily Summary"), SessionBucket::Overnight);
        assert_eq!(classify_name("Model Retrain"), SessionBucket::Overnight);
    }

    #[test]
    fn keyword_order_resolves_overlaps() {
        // "weekend" row is checked before "trading"
        assert_eq!(classify_name("Weekend Trading Recap"), SessionBucket::Weekend);
        assert_eq!(classify_name("PRE-MARKET scan"), SessionBucket::PreMarket);
    }

    #[test]
    fn strategies_can_disagree_for_the_same_job() {
        // Saturday 10:00 EDT run of a job whose name says nothing about weekends
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 14, 0, 0).unwrap();
        let by_hour = ClassificationStrategy::HourWindow.classifier(eastern());
        let by_name = ClassificationStrategy::Keyword.classifier(eastern());
        assert_eq!(by_hour.classify("Active Trading Collection", at), SessionBucket::Weekend);
        assert_eq!(by_name.classify("Active Trading Collection", at), SessionBucket::MarketHours);
    }

    #[test]
    fn classification_is_repeatable() {
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 13, 45, 0).unwrap();
        let c = ClassificationStrategy::HourWindowPrecise.classifier(eastern());
        let first = c.classify("x", at);
        for _ in 0..10 {
            assert_eq!(c.classify("x", at), first);
        }
    }

    #[test]
    fn strategy_parses_from_query_values() {
        assert_eq!("keyword".parse::<ClassificationStrategy>().unwrap(), ClassificationStrategy::Keyword);
        assert_eq!(
            "hour-window-precise".parse::<ClassificationStrategy>().unwrap(),
            ClassificationStrategy::HourWindowPrecise
        );
        assert!("vibes".parse::<ClassificationStrategy>().is_err());
    }
}
