//! Preset schedule catalog.
//!
//! Presets are authored in the reference zone and loaded once. Each also
//! carries the UTC cron expression the backend runs on; [`PresetCatalog::cron_drift`]
//! reports presets whose cron no longer fires at the reference time (the
//! usual cause is a DST change since the cron was written).

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{PresetSchedule, ReferenceTimeSpec, SessionBucket, Weekdays};

/// Look-ahead used when comparing a preset's cron with its reference spec.
const DRIFT_WINDOW_DAYS: i64 = 7;

/// Days tried past a DST gap before giving up.
const DST_GAP_LOOKAHEAD_DAYS: i64 = 3;

const CRON_DAY_NAMES: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<PresetSchedule>,
}

/// A preset whose configured UTC cron disagrees with its reference time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CronDrift {
    pub preset_id: String,
    pub name: String,
    pub configured: String,
    pub expected: String,
}

impl PresetCatalog {
    /// Build a catalog, rejecting duplicate ids/names and malformed entries.
    pub fn new(presets: Vec<PresetSchedule>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for p in &presets {
            if !ids.insert(p.id.as_str()) {
                return Err(AppError::InvalidCatalog(format!("duplicate preset id: {}", p.id)));
            }
            if !names.insert(p.name.as_str()) {
                return Err(AppError::InvalidCatalog(format!(
                    "duplicate preset name: {:?}",
                    p.name
                )));
            }
            let t = &p.reference_time;
            if t.hour > 23 || t.minute > 59 {
                return Err(AppError::InvalidCatalog(format!(
                    "{}: reference time {:02}:{:02} out of range",
                    p.id, t.hour, t.minute
                )));
            }
            if t.days.is_empty() {
                return Err(AppError::InvalidCatalog(format!("{}: no weekdays selected", p.id)));
            }
            parse_cron(&p.cron_utc)
                .map_err(|e| AppError::InvalidCatalog(format!("{}: {e}", p.id)))?;
        }

        Ok(Self { presets })
    }

    /// The presets shipped with the product, authored in US Eastern time.
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Load a JSON array of presets from disk.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let presets: Vec<PresetSchedule> = serde_json::from_str(&raw)?;
        debug!(path, count = presets.len(), "preset catalog file parsed");
        Self::new(presets)
    }

    pub fn presets(&self) -> &[PresetSchedule] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Presets whose `cron_utc` fire times over the next week differ from the
    /// times their reference spec produces in `zone`.
    pub fn cron_drift(&self, zone: Tz, now: DateTime<Utc>) -> Vec<CronDrift> {
        let window = Duration::days(DRIFT_WINDOW_DAYS);
        self.presets
            .iter()
            .filter_map(|p| {
                let schedule = parse_cron(&p.cron_utc).ok()?;
                let configured: Vec<DateTime<Utc>> = schedule
                    .after(&now)
                    .take_while(|t| *t <= now + window)
                    .collect();
                let expected = upcoming_reference_runs(&p.reference_time, zone, now, window);
                if configured == expected {
                    return None;
                }
                let today = now.with_timezone(&zone).date_naive();
                Some(CronDrift {
                    preset_id: p.id.clone(),
                    name: p.name.clone(),
                    configured: p.cron_utc.clone(),
                    expected: derive_utc_cron(&p.reference_time, zone, today)?,
                })
            })
            .collect()
    }
}

/// The 5-field UTC cron that fires at `spec` under `zone`'s offset on `on`.
///
/// When the UTC time falls on a different calendar day than the reference
/// time, the weekday field is rotated accordingly. A time inside a DST gap
/// uses the offset of the following day. `None` for an out-of-range time.
pub fn derive_utc_cron(spec: &ReferenceTimeSpec, zone: Tz, on: NaiveDate) -> Option<String> {
    let (day, utc) = (0..DST_GAP_LOOKAHEAD_DAYS)
        .map(|i| on + Duration::days(i))
        .find_map(|day| resolve_local(zone, day, spec.hour, spec.minute).map(|utc| (day, utc)))?;
    let shift = (utc.date_naive() - day).num_days();
    let days: Vec<&str> = spec
        .days
        .shifted(shift)
        .days()
        .map(|d| CRON_DAY_NAMES[d.num_days_from_monday() as usize])
        .collect();
    let dow = if days.len() == 7 {
        "*".to_string()
    } else {
        days.join(",")
    };
    Some(format!("{} {} * * {}", utc.minute(), utc.hour(), dow))
}

/// Every instant in `(now, now + horizon]` at which `spec` fires in `zone`.
///
/// Local times that do not exist (spring-forward gap) are skipped.
pub fn upcoming_reference_runs(
    spec: &ReferenceTimeSpec,
    zone: Tz,
    now: DateTime<Utc>,
    horizon: Duration,
) -> Vec<DateTime<Utc>> {
    let end = now + horizon;
    let first = now.with_timezone(&zone).date_naive() - Duration::days(1);
    let last = end.with_timezone(&zone).date_naive() + Duration::days(1);

    let mut runs = Vec::new();
    let mut day = first;
    while day <= last {
        if spec.days.contains(day.weekday()) {
            if let Some(at) = resolve_local(zone, day, spec.hour, spec.minute) {
                if at > now && at <= end {
                    runs.push(at);
                }
            }
        }
        day += Duration::days(1);
    }
    runs
}

/// Parse a 5-field Unix cron (or an already-extended 6/7-field one).
pub fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(&to_cron_crate_format(expression))
        .map_err(|e| AppError::InvalidCron(format!("{expression}: {e}")))
}

/// The `cron` crate wants `sec min hour dom month dow [year]`.
fn to_cron_crate_format(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

fn resolve_local(zone: Tz, day: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(hour, minute, 0)?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn builtin_presets() -> Vec<PresetSchedule> {
    vec![
        PresetSchedule {
            id: "pre-market-prep".to_string(),
            name: "Pre-Market Preparation".to_string(),
            reference_time: ReferenceTimeSpec {
                hour: 7,
                minute: 0,
                days: Weekdays::WEEKDAYS,
            },
            cron_utc: "0 11 * * MON-FRI".to_string(),
            session: SessionBucket::PreMarket,
            description: "Weekdays at 7:00 AM ET".to_string(),
            rationale: "Collects overnight news and social chatter so sentiment is fresh \
                        before the opening bell."
                .to_string(),
        },
        PresetSchedule {
            id: "active-trading".to_string(),
            name: "Active Trading Collection".to_string(),
            reference_time: ReferenceTimeSpec {
                hour: 10,
                minute: 0,
                days: Weekdays::WEEKDAYS,
            },
            cron_utc: "0 14 * * MON-FRI".to_string(),
            session: SessionBucket::MarketHours,
            description: "Weekdays at 10:00 AM ET".to_string(),
            rationale: "Runs after the opening volatility settles to capture the first \
                        wave of intraday reaction."
                .to_string(),
        },
        PresetSchedule {
            id: "after-hours".to_string(),
            name: "After-Hours Analysis".to_string(),
            reference_time: ReferenceTimeSpec {
                hour: 17,
                minute: 0,
                days: Weekdays::WEEKDAYS,
            },
            cron_utc: "0 21 * * MON-FRI".to_string(),
            session: SessionBucket::AfterHours,
            description: "Weekdays at 5:00 PM ET".to_string(),
            rationale: "Picks up earnings releases and closing commentary published \
                        after 4:00 PM."
                .to_string(),
        },
        PresetSchedule {
            id: "weekend-deep".to_string(),
            name: "Weekend Deep Analysis".to_string(),
            reference_time: ReferenceTimeSpec {
                hour: 10,
                minute: 0,
                days: Weekdays::SATURDAY,
            },
            cron_utc: "0 14 * * SAT".to_string(),
            session: SessionBucket::Weekend,
            description: "Saturdays at 10:00 AM ET".to_string(),
            rationale: "Full-week backfill and model accuracy review while markets are \
                        closed."
                .to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn eastern() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn preset(id: &str, name: &str) -> PresetSchedule {
        PresetSchedule {
            id: id.to_string(),
            name: name.to_string(),
            reference_time: ReferenceTimeSpec {
                hour: 9,
                minute: 30,
                days: Weekdays::WEEKDAYS,
            },
            cron_utc: "30 13 * * MON-FRI".to_string(),
            session: SessionBucket::MarketHours,
            description: String::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn builtin_catalog_passes_validation() {
        let builtin = PresetCatalog::builtin();
        let validated = PresetCatalog::new(builtin.presets().to_vec()).unwrap();
        assert_eq!(validated.len(), 4);
        assert!(!validated.is_empty());
        assert!(validated.presets().iter().any(|p| p.id == "weekend-deep"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PresetCatalog::new(vec![preset("a", "Same"), preset("b", "Same")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidCatalog(ref m) if m.contains("duplicate preset name")));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = PresetCatalog::new(vec![preset("a", "One"), preset("a", "Two")]).unwrap_err();
        assert!(matches!(err, AppError::InvalidCatalog(ref m) if m.contains("duplicate preset id")));
    }

    #[test]
    fn names_differing_only_by_whitespace_are_distinct() {
        let catalog =
            PresetCatalog::new(vec![preset("a", "Scan"), preset("b", "Scan ")]).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn bad_cron_and_empty_days_are_rejected() {
        let mut bad_cron = preset("a", "A");
        bad_cron.cron_utc = "not a cron".to_string();
        assert!(PresetCatalog::new(vec![bad_cron]).is_err());

        let mut no_days = preset("b", "B");
        no_days.reference_time.days = Weekdays::from_days(&[]);
        assert!(PresetCatalog::new(vec![no_days]).is_err());
    }

    #[test]
    fn derive_cron_tracks_offset() {
        let spec = ReferenceTimeSpec {
            hour: 9,
            minute: 30,
            days: Weekdays::WEEKDAYS,
        };
        let winter = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let summer = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap();
        assert_eq!(
            derive_utc_cron(&spec, eastern(), winter).as_deref(),
            Some("30 14 * * MON,TUE,WED,THU,FRI")
        );
        assert_eq!(
            derive_utc_cron(&spec, eastern(), summer).as_deref(),
            Some("30 13 * * MON,TUE,WED,THU,FRI")
        );
    }

    #[test]
    fn derive_cron_rotates_days_past_midnight_utc() {
        let spec = ReferenceTimeSpec {
            hour: 21,
            minute: 0,
            days: Weekdays::from_days(&[Weekday::Fri]),
        };
        let winter = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        // 21:00 EST Friday = 02:00 UTC Saturday
        assert_eq!(derive_utc_cron(&spec, eastern(), winter).as_deref(), Some("0 2 * * SAT"));
    }

    #[test]
    fn derive_cron_inside_dst_gap_uses_next_day_offset() {
        let spec = ReferenceTimeSpec {
            hour: 2,
            minute: 30,
            days: Weekdays::from_days(&[Weekday::Sun]),
        };
        // 2026-03-08 02:30 does not exist in New York; Monday is on EDT.
        let spring_forward = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(
            derive_utc_cron(&spec, eastern(), spring_forward).as_deref(),
            Some("30 6 * * SUN")
        );
    }

    #[test]
    fn derive_cron_rejects_out_of_range_time() {
        let on = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let bad_hour = ReferenceTimeSpec { hour: 24, minute: 0, days: Weekdays::WEEKDAYS };
        let bad_minute = ReferenceTimeSpec { hour: 9, minute: 60, days: Weekdays::WEEKDAYS };
        assert_eq!(derive_utc_cron(&bad_hour, eastern(), on), None);
        assert_eq!(derive_utc_cron(&bad_minute, eastern(), on), None);
    }

    #[test]
    fn upcoming_runs_respect_window_and_days() {
        let spec = ReferenceTimeSpec {
            hour: 10,
            minute: 0,
            days: Weekdays::SATURDAY,
        };
        // Thursday 2026-10-15 12:00 UTC; Saturday 10:00 EDT = 14:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 14, 0, 0).unwrap();

        let within = upcoming_reference_runs(&spec, eastern(), now, Duration::hours(50));
        assert_eq!(within, vec![saturday]);

        let short = upcoming_reference_runs(&spec, eastern(), now, Duration::hours(48));
        assert!(short.is_empty());
    }

    #[test]
    fn builtin_crons_match_in_summer_and_drift_in_winter() {
        let catalog = PresetCatalog::builtin();

        // Mid-July: EDT in force for the whole look-ahead week.
        let summer = Utc.with_ymd_and_hms(2026, 7, 13, 0, 0, 0).unwrap();
        assert!(catalog.cron_drift(eastern(), summer).is_empty());

        // Mid-January: every EDT-authored cron fires an hour early.
        let winter = Utc.with_ymd_and_hms(2026, 1, 12, 0, 0, 0).unwrap();
        let drift = catalog.cron_drift(eastern(), winter);
        assert_eq!(drift.len(), 4);
        let prep = drift.iter().find(|d| d.preset_id == "pre-market-prep").unwrap();
        assert_eq!(prep.configured, "0 11 * * MON-FRI");
        assert_eq!(prep.expected, "0 12 * * MON,TUE,WED,THU,FRI");
    }

    #[test]
    fn weekdays_serialize_as_names() {
        let json = serde_json::to_string(&Weekdays::SATURDAY).unwrap();
        assert_eq!(json, r#"["sat"]"#);
        let parsed: Weekdays = serde_json::from_str(r#"["Monday","fri"]"#).unwrap();
        assert!(parsed.contains(Weekday::Mon) && parsed.contains(Weekday::Fri));
        assert!(!parsed.contains(Weekday::Tue));
        assert!(serde_json::from_str::<Weekdays>(r#"["funday"]"#).is_err());
    }
}
