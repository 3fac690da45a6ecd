//! Departure time math.
//!
//! The SL Transport API provides timestamps as ISO 8601 strings, usually
//! naive Stockholm local time but occasionally with an explicit offset.
//! This module derives the display quantities (delay, minutes to
//! departure, clock time) from those strings.
//!
//! All functions here are total: a missing or malformed timestamp degrades
//! to `None`/`0` locally and never reaches the caller as an error. Naive
//! and zone-aware instants are never mixed in one comparison: naive
//! timestamps are compared against the local clock, zone-aware ones
//! against UTC.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};

/// A parsed timestamp, keeping track of whether it carried an offset.
#[derive(Debug, Clone, Copy)]
enum Stamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// Parse an ISO 8601 timestamp, with or without an offset.
fn parse_stamp(s: &str) -> Option<Stamp> {
    if let Ok(dt) = s.parse::<DateTime<FixedOffset>>() {
        return Some(Stamp::Zoned(dt));
    }
    s.parse::<NaiveDateTime>().ok().map(Stamp::Naive)
}

/// Delay in whole minutes between the scheduled and expected timestamps.
///
/// Returns `None` if either timestamp is missing or unparsable, or if the
/// two are not in the same frame (one naive, one zone-aware). The result
/// is truncated toward zero and may be negative for early departures.
///
/// # Examples
///
/// ```
/// use sl_departures::timefmt::delay_minutes;
///
/// let scheduled = Some("2024-03-15T10:00:00Z");
/// let expected = Some("2024-03-15T10:05:00Z");
/// assert_eq!(delay_minutes(scheduled, expected), Some(5));
///
/// assert_eq!(delay_minutes(scheduled, None), None);
/// assert_eq!(delay_minutes(scheduled, Some("garbage")), None);
/// ```
pub fn delay_minutes(scheduled: Option<&str>, expected: Option<&str>) -> Option<i64> {
    let scheduled = parse_stamp(scheduled?)?;
    let expected = parse_stamp(expected?)?;

    let secs = match (scheduled, expected) {
        (Stamp::Zoned(s), Stamp::Zoned(e)) => e.signed_duration_since(s).num_seconds(),
        (Stamp::Naive(s), Stamp::Naive(e)) => e.signed_duration_since(s).num_seconds(),
        _ => return None,
    };

    Some(secs / 60)
}

/// Whole minutes from `now` until the expected timestamp, never negative.
///
/// A missing or unparsable timestamp counts as departing now (0). Naive
/// timestamps are compared against `now` on the local clock; zone-aware
/// timestamps are compared against `now` directly.
pub fn minutes_until(expected: Option<&str>, now: DateTime<Utc>) -> i64 {
    let Some(raw) = expected else {
        return 0;
    };
    let Some(stamp) = parse_stamp(raw) else {
        return 0;
    };

    let secs = match stamp {
        Stamp::Zoned(e) => e.signed_duration_since(now).num_seconds(),
        Stamp::Naive(e) => e
            .signed_duration_since(now.with_timezone(&Local).naive_local())
            .num_seconds(),
    };

    (secs / 60).max(0)
}

/// Format a timestamp as "HH:MM" for display.
///
/// Zone-aware timestamps are converted to the local display zone first;
/// naive timestamps are formatted as-is. Missing or unparsable input
/// yields `None`.
///
/// # Examples
///
/// ```
/// use sl_departures::timefmt::format_clock;
///
/// assert_eq!(
///     format_clock(Some("2024-03-15T09:05:00")),
///     Some("09:05".to_string())
/// );
/// assert_eq!(format_clock(Some("not a time")), None);
/// assert_eq!(format_clock(None), None);
/// ```
pub fn format_clock(timestamp: Option<&str>) -> Option<String> {
    match parse_stamp(timestamp?)? {
        Stamp::Zoned(dt) => Some(dt.with_timezone(&Local).format("%H:%M").to_string()),
        Stamp::Naive(dt) => Some(dt.format("%H:%M").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn delay_between_naive_timestamps() {
        assert_eq!(
            delay_minutes(Some("2024-03-15T10:00:00"), Some("2024-03-15T10:05:00")),
            Some(5)
        );
    }

    #[test]
    fn delay_negative_for_early_departure() {
        assert_eq!(
            delay_minutes(Some("2024-03-15T10:05:00Z"), Some("2024-03-15T10:00:00Z")),
            Some(-5)
        );
    }

    #[test]
    fn delay_truncates_toward_zero() {
        // 90 seconds late is one whole minute
        assert_eq!(
            delay_minutes(Some("2024-03-15T10:00:00Z"), Some("2024-03-15T10:01:30Z")),
            Some(1)
        );
        // 90 seconds early is also one whole minute
        assert_eq!(
            delay_minutes(Some("2024-03-15T10:01:30Z"), Some("2024-03-15T10:00:00Z")),
            Some(-1)
        );
    }

    #[test]
    fn delay_rejects_mixed_frames() {
        assert_eq!(
            delay_minutes(Some("2024-03-15T10:00:00"), Some("2024-03-15T10:05:00Z")),
            None
        );
    }

    #[test]
    fn delay_absent_inputs() {
        assert_eq!(delay_minutes(None, Some("2024-03-15T10:05:00Z")), None);
        assert_eq!(delay_minutes(Some("2024-03-15T10:00:00Z"), None), None);
        assert_eq!(delay_minutes(None, None), None);
        assert_eq!(delay_minutes(Some("25:99"), Some("2024-03-15T10:05:00Z")), None);
    }

    #[test]
    fn minutes_until_future() {
        let expected = (now() + chrono::Duration::minutes(30)).to_rfc3339();
        assert_eq!(minutes_until(Some(&expected), now()), 30);
    }

    #[test]
    fn minutes_until_past_is_zero() {
        let expected = (now() - chrono::Duration::minutes(10)).to_rfc3339();
        assert_eq!(minutes_until(Some(&expected), now()), 0);
    }

    #[test]
    fn minutes_until_degrades_to_zero() {
        assert_eq!(minutes_until(None, now()), 0);
        assert_eq!(minutes_until(Some("garbage"), now()), 0);
    }

    #[test]
    fn format_clock_naive() {
        assert_eq!(
            format_clock(Some("2024-03-15T14:30:00")),
            Some("14:30".to_string())
        );
    }

    #[test]
    fn format_clock_zoned_is_some() {
        // The exact value depends on the local display zone; only the
        // shape is asserted here.
        let formatted = format_clock(Some("2024-03-15T14:30:00Z")).unwrap();
        assert_eq!(formatted.len(), 5);
        assert_eq!(formatted.as_bytes()[2], b':');
    }

    #[test]
    fn format_clock_degrades_to_none() {
        assert_eq!(format_clock(None), None);
        assert_eq!(format_clock(Some("")), None);
        assert_eq!(format_clock(Some("2024-03-15")), None);
    }
}
