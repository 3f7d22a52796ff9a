//! Input validation and timestamp helpers.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::error::ServiceError;

/// Format a UTC instant as a fixed-width RFC 3339 string
/// (`2026-08-30T12:34:56.789Z`). Fixed millisecond precision keeps SQL string
/// comparison equal to chronological comparison.
pub fn ts_at(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant in the ledger's timestamp format.
pub fn now_ts() -> String {
    ts_at(Utc::now())
}

/// The UTC calendar date (`YYYY-MM-DD`) a ledger timestamp falls on.
/// Falls back to the whole string when it is too short or byte 10 is not a
/// character boundary.
pub fn day_key(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}

pub fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Local midnight of the current day, as a UTC instant. "Today" counters in
/// dashboard stats cut off here rather than at UTC midnight.
pub fn local_midnight_utc() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // A DST gap exactly at midnight: fall back to 24h ago, which only
        // widens the "today" window by the skipped hour.
        LocalResult::None => Utc::now() - Duration::hours(24),
    }
}

/// Trim and bounds-check a required string field.
pub fn validate_bounded_string(
    value: &str,
    field: &str,
    min: usize,
    max: usize,
) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.len() < min {
        return Err(ServiceError::Validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if trimmed.len() > max {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a `YYYY-MM-DD` date string.
pub fn validate_yyyy_mm_dd(value: &str, field: &str) -> Result<(), ServiceError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ServiceError::Validation(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ts_is_fixed_width_and_ordered() {
        let a = ts_at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let b = ts_at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap());
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn day_key_takes_utc_date_prefix() {
        assert_eq!(day_key("2026-03-01T23:59:59.000Z"), "2026-03-01");
        assert_eq!(day_key("short"), "short");
        // Multibyte input straddling byte 10 must not panic.
        assert_eq!(day_key("2026-03-0日曜日"), "2026-03-0日曜日");
    }

    #[test]
    fn parse_round_trips() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 7, 5, 9).unwrap();
        assert_eq!(parse_ts(&ts_at(now)), Some(now));
    }

    #[test]
    fn bounded_string_trims_and_checks() {
        assert_eq!(
            validate_bounded_string("  hi  ", "title", 1, 10).unwrap(),
            "hi"
        );
        assert!(validate_bounded_string("", "title", 1, 10).is_err());
        assert!(validate_bounded_string("toolongvalue", "title", 1, 5).is_err());
    }

    #[test]
    fn date_validation() {
        assert!(validate_yyyy_mm_dd("2026-02-30", "date").is_err());
        assert!(validate_yyyy_mm_dd("2026-02-28", "date").is_ok());
        assert!(validate_yyyy_mm_dd("yesterday", "date").is_err());
    }
}
