//! Date parsing for configured target/creation dates and vendor timestamps

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

/// Layouts tried after RFC 3339, interpreted as UTC wall-clock times
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const OFFSET_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Parse a configured date, degrading instead of failing.
///
/// Tries RFC 3339, then calendar reconstruction from common layouts, then
/// numeric epochs. Input that matches none of them yields `now` so the
/// countdown keeps rendering.
pub fn parse_to_timestamp(input: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let trimmed = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return at.with_timezone(&Utc);
    }

    debug!("'{}' is not RFC 3339, reconstructing from calendar layouts", trimmed);
    if let Some(at) = parse_calendar_instant(trimmed) {
        return at;
    }

    warn!("'{}' matched no calendar layout, trying epoch", trimmed);
    if let Some(at) = parse_epoch(trimmed) {
        return at;
    }

    warn!("Unparseable date '{}', falling back to current time", trimmed);
    now
}

/// Parse without the current-time fallback
pub fn try_parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    parse_calendar_instant(trimmed).or_else(|| parse_epoch(trimmed))
}

/// RFC 3339 or one of the calendar layouts; numbers are not accepted
pub fn parse_calendar_instant(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(input) {
        return Some(at.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(at) = DateTime::parse_from_str(input, layout) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(input, layout) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Epoch milliseconds to an instant
pub fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// Epoch seconds to an instant
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    from_epoch_millis(seconds * 1000.0)
}

fn parse_epoch(input: &str) -> Option<DateTime<Utc>> {
    let value = input.parse::<f64>().ok().filter(|v| *v > 0.0)?;
    if value > EPOCH_MILLIS_THRESHOLD {
        from_epoch_millis(value)
    } else {
        from_epoch_seconds(value)
    }
}
