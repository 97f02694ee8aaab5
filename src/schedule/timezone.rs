//! Reference-zone → display-zone wall-clock conversion.
//!
//! Preset times are authored in the exchange's zone. To show them to a viewer
//! we take the signed distance between the requested reference wall-clock
//! time and the reference zone's current wall-clock time, apply it to the
//! current instant, and format the result in the display zone. Neither zone's
//! UTC offset is derived by hand.
//!
//! Known gap: if a DST transition in the reference zone falls between "now"
//! and the requested time on the same day, the delta is off by the
//! transition amount and the displayed time drifts by one hour.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{AppError, Result};

/// Resolve an IANA zone name (`America/New_York`, `UTC`, `Etc/GMT-8`).
pub fn parse_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::UnknownTimezone(name.to_string()))
}

/// Convert `ref_hour:ref_minute` in `reference_zone` to an `HH:MM` string in
/// `display_zone`, anchored on `now`.
pub fn convert_reference_time(
    now: DateTime<Utc>,
    ref_hour: u32,
    ref_minute: u32,
    reference_zone: &str,
    display_zone: &str,
) -> Result<String> {
    let reference = parse_zone(reference_zone)?;
    let display = parse_zone(display_zone)?;
    let target = reference_instant(now, ref_hour, ref_minute, reference)?;
    Ok(format_in_zone(target, display, "%H:%M"))
}

/// The instant `now + (requested − current)` in reference wall-clock minutes.
///
/// Seconds of `now` are carried through unchanged; callers format to minutes.
pub fn reference_instant(
    now: DateTime<Utc>,
    ref_hour: u32,
    ref_minute: u32,
    reference: Tz,
) -> Result<DateTime<Utc>> {
    if ref_hour > 23 || ref_minute > 59 {
        return Err(AppError::InvalidTime {
            hour: ref_hour,
            minute: ref_minute,
        });
    }

    let local_now = now.with_timezone(&reference);
    let requested = i64::from(ref_hour * 60 + ref_minute);
    let current = i64::from(local_now.hour() * 60 + local_now.minute());

    Ok(now + Duration::minutes(requested - current))
}

/// Format an instant in `zone` with a chrono strftime pattern.
pub fn format_in_zone<Z: TimeZone>(instant: DateTime<Utc>, zone: Z, pattern: &str) -> String
where
    Z::Offset: std::fmt::Display,
{
    instant.with_timezone(&zone).format(pattern).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn winter_open_to_utc_plus_8() {
        // 2026-01-14 15:00 UTC = 10:00 EST (UTC-5)
        let now = utc(2026, 1, 14, 15, 0);
        let shown = convert_reference_time(now, 9, 30, "America/New_York", "Etc/GMT-8").unwrap();
        // 09:30 EST = 14:30 UTC = 22:30 UTC+8
        assert_eq!(shown, "22:30");
    }

    #[test]
    fn summer_open_to_utc_plus_8() {
        // 2026-07-15 14:00 UTC = 10:00 EDT (UTC-4)
        let now = utc(2026, 7, 15, 14, 0);
        let shown = convert_reference_time(now, 9, 30, "America/New_York", "Asia/Shanghai").unwrap();
        // 09:30 EDT = 13:30 UTC = 21:30 CST
        assert_eq!(shown, "21:30");
    }

    #[test]
    fn same_zone_is_identity_outside_transitions() {
        let now = utc(2026, 10, 6, 18, 42);
        for (h, m) in [(0, 0), (7, 0), (9, 30), (16, 15), (23, 59)] {
            let shown =
                convert_reference_time(now, h, m, "America/New_York", "America/New_York").unwrap();
            assert_eq!(shown, format!("{h:02}:{m:02}"));
        }
    }

    #[test]
    fn later_time_in_reference_can_land_on_next_display_day() {
        // 20:00 EST is 01:00 UTC the next day
        let now = utc(2026, 1, 14, 15, 0);
        let target = reference_instant(now, 20, 0, parse_zone("America/New_York").unwrap()).unwrap();
        assert_eq!(target, utc(2026, 1, 15, 1, 0));
    }

    #[test]
    fn dst_transition_between_now_and_target_drifts_one_hour() {
        // 2026-03-08: clocks jump 02:00 EST -> 03:00 EDT. At noon EDT (16:00 UTC)
        // asking for 01:30 subtracts 10h30m and lands on 05:30 UTC = 00:30 EST.
        let now = utc(2026, 3, 8, 16, 0);
        let shown =
            convert_reference_time(now, 1, 30, "America/New_York", "America/New_York").unwrap();
        assert_eq!(shown, "00:30");
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let now = utc(2026, 1, 14, 15, 0);
        let err = convert_reference_time(now, 9, 30, "America/New_York", "Mars/Olympus").unwrap_err();
        assert!(matches!(err, AppError::UnknownTimezone(ref z) if z == "Mars/Olympus"));

        let err = convert_reference_time(now, 9, 30, "Nowhere", "UTC").unwrap_err();
        assert!(matches!(err, AppError::UnknownTimezone(_)));
    }

    #[test]
    fn out_of_range_time_is_rejected() {
        let now = utc(2026, 1, 14, 15, 0);
        assert!(matches!(
            convert_reference_time(now, 24, 0, "UTC", "UTC"),
            Err(AppError::InvalidTime { hour: 24, minute: 0 })
        ));
        assert!(matches!(
            convert_reference_time(now, 9, 60, "UTC", "UTC"),
            Err(AppError::InvalidTime { .. })
        ));
    }
}
