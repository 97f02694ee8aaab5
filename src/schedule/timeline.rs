//! Upcoming-run timeline.
//!
//! A job appears iff its `next_run` parses and lies in `(now, now + horizon]`.
//! A run exactly at `now` is already happening and is left out; a run exactly
//! at the horizon edge is kept. Unparsable instants are dropped silently.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::trace;

use crate::schedule::session::SessionClassifier;
use crate::types::{ScheduledJob, TimelineEvent};

/// Parse a backend instant. RFC 3339 keeps its offset; a naive ISO-8601
/// string (no offset) is taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn build_timeline(
    jobs: &[ScheduledJob],
    now: DateTime<Utc>,
    horizon_hours: u32,
    classifier: &dyn SessionClassifier,
) -> Vec<TimelineEvent> {
    // Saturates at the latest representable instant.
    let end = Duration::try_hours(i64::from(horizon_hours))
        .and_then(|h| now.checked_add_signed(h))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let mut events: Vec<TimelineEvent> = jobs
        .iter()
        .filter_map(|job| {
            let raw = job.next_run.as_deref()?;
            let Some(at) = parse_instant(raw) else {
                trace!(job_id = %job.job_id, raw, "dropping job with unparsable next_run");
                return None;
            };
            if at <= now || at > end {
                return None;
            }
            let session = classifier.classify(&job.name, at);
            Some(TimelineEvent {
                job_id: job.job_id.clone(),
                job_name: job.name.clone(),
                scheduled_at: at,
                session,
                session_label: session.label(),
                color: session.color(),
            })
        })
        .collect();

    let mut seen = HashSet::new();
    events.retain(|e| seen.insert((e.job_id.clone(), e.scheduled_at)));

    // Stable: equal instants keep backend order.
    events.sort_by_key(|e| e.scheduled_at);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::catalog::PresetCatalog;
    use crate::schedule::matcher::reconcile;
    use crate::schedule::session::{ClassificationStrategy, KeywordClassifier};
    use crate::types::{JobStatus, SessionBucket};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn job(id: &str, name: &str, next_run: Option<String>) -> ScheduledJob {
        ScheduledJob {
            job_id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            status: JobStatus::Pending,
            next_run,
            last_run: None,
            last_duration_seconds: None,
            today_run_count: None,
            last_error: None,
        }
    }

    fn now() -> DateTime<Utc> {
        // Thursday 2026-10-15 23:00 UTC
        Utc.with_ymd_and_hms(2026, 10, 15, 23, 0, 0).unwrap()
    }

    #[test]
    fn parses_offset_and_naive_instants() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap();
        assert_eq!(parse_instant("2026-10-17T15:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2026-10-17T11:00:00-04:00"), Some(expected));
        assert_eq!(parse_instant("2026-10-17T15:00:00"), Some(expected));
        assert_eq!(parse_instant("2026-10-17T15:00:00.000000"), Some(expected));
        assert_eq!(parse_instant("2026-10-17 15:00:00"), Some(expected));
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant(""), None);
    }

    #[test]
    fn lower_bound_is_strict_upper_bound_inclusive() {
        let n = now();
        let jobs = vec![
            job("at-now", "a", Some(n.to_rfc3339())),
            job("at-edge", "b", Some((n + Duration::hours(48)).to_rfc3339())),
            job("past-edge", "c", Some((n + Duration::hours(48) + Duration::milliseconds(1)).to_rfc3339())),
            job("just-after", "d", Some((n + Duration::milliseconds(1)).to_rfc3339())),
        ];
        let ids: Vec<_> = build_timeline(&jobs, n, 48, &KeywordClassifier)
            .into_iter()
            .map(|e| e.job_id)
            .collect();
        assert_eq!(ids, vec!["just-after", "at-edge"]);
    }

    #[test]
    fn missing_and_unparsable_next_run_are_skipped() {
        let n = now();
        let jobs = vec![
            job("none", "a", None),
            job("garbage", "b", Some("soon-ish".to_string())),
            job("ok", "c", Some((n + Duration::hours(1)).to_rfc3339())),
        ];
        let timeline = build_timeline(&jobs, n, 48, &KeywordClassifier);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].job_id, "ok");
    }

    #[test]
    fn output_is_sorted_and_deduplicated() {
        let n = now();
        let t1 = (n + Duration::hours(3)).to_rfc3339();
        let t2 = (n + Duration::hours(1)).to_rfc3339();
        let jobs = vec![
            job("x", "a", Some(t1.clone())),
            job("y", "b", Some(t2)),
            job("z", "c", Some(t1.clone())),
            job("x", "a", Some(t1)),
        ];
        let timeline = build_timeline(&jobs, n, 48, &KeywordClassifier);
        let ids: Vec<_> = timeline.iter().map(|e| e.job_id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }

    #[test]
    fn events_carry_session_and_color() {
        let n = now();
        let jobs = vec![job("p", "Pre-Market Preparation", Some((n + Duration::hours(2)).to_rfc3339()))];
        let timeline = build_timeline(&jobs, n, 48, &KeywordClassifier);
        assert_eq!(timeline[0].session, SessionBucket::PreMarket);
        assert_eq!(timeline[0].session_label, "Pre-Market");
        assert_eq!(timeline[0].color, SessionBucket::PreMarket.color());
    }

    #[test]
    fn weekend_job_end_to_end() {
        // Saturday 15:00 UTC is 40 hours after Thursday 23:00 UTC.
        let n = now();
        let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap();
        assert_eq!(saturday - n, Duration::hours(40));

        let catalog = PresetCatalog::builtin();
        let jobs = vec![job("wk", "Weekend Deep Analysis", Some(saturday.to_rfc3339()))];

        let merged = reconcile(catalog.presets(), &jobs);
        let weekend = merged.iter().find(|r| r.preset.id == "weekend-deep").unwrap();
        assert_eq!(weekend.job.map(|j| j.job_id.as_str()), Some("wk"));

        let classifier = ClassificationStrategy::Keyword.classifier(chrono_tz::America::New_York);
        let within = build_timeline(&jobs, n, 48, classifier.as_ref());
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].session, SessionBucket::Weekend);

        assert!(build_timeline(&jobs, n, 24, classifier.as_ref()).is_empty());
    }

    #[test]
    fn huge_horizon_saturates_instead_of_overflowing() {
        let n = now();
        let far = Utc.with_ymd_and_hms(2400, 1, 1, 0, 0, 0).unwrap();
        let jobs = vec![
            job("past", "a", Some((n - Duration::hours(1)).to_rfc3339())),
            job("far", "b", Some(far.to_rfc3339())),
        ];
        let timeline = build_timeline(&jobs, n, u32::MAX, &KeywordClassifier);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].job_id, "far");

        let near_max = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert!(build_timeline(&jobs, near_max, 48, &KeywordClassifier).is_empty());
    }

    proptest! {
        #[test]
        fn membership_matches_window(offsets in proptest::collection::vec(-72_000i64..=200_000, 0..40)) {
            let n = now();
            let jobs: Vec<_> = offsets
                .iter()
                .enumerate()
                .map(|(i, secs)| job(&i.to_string(), "j", Some((n + Duration::seconds(*secs)).to_rfc3339())))
                .collect();
            let timeline = build_timeline(&jobs, n, 48, &KeywordClassifier);

            let expected = offsets.iter().filter(|s| **s > 0 && **s <= 48 * 3600).count();
            prop_assert_eq!(timeline.len(), expected);
            for e in &timeline {
                prop_assert!(e.scheduled_at > n && e.scheduled_at <= n + Duration::hours(48));
            }
        }

        #[test]
        fn output_is_non_decreasing(offsets in proptest::collection::vec(1i64..=172_800, 0..40)) {
            let n = now();
            let jobs: Vec<_> = offsets
                .iter()
                .enumerate()
                .map(|(i, secs)| job(&i.to_string(), "j", Some((n + Duration::seconds(*secs)).to_rfc3339())))
                .collect();
            let timeline = build_timeline(&jobs, n, 48, &KeywordClassifier);
            prop_assert!(timeline.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));
        }
    }
}
