//! Duration parsing for the encodings timer integrations emit

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::dates::parse_calendar_instant;

/// A timer-ish value that is either a span or an absolute instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerValue {
    Seconds(u64),
    Instant(DateTime<Utc>),
    Unknown,
}

/// Parse a JSON duration value into whole seconds.
///
/// Numbers are taken as seconds; strings go through [`parse_duration_str`].
/// Anything else is 0, which callers treat as "unknown" rather than "instant".
pub fn parse_duration(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_f64().map(seconds_from_f64).unwrap_or(0),
        Value::String(s) => parse_duration_str(s),
        _ => 0,
    }
}

/// Parse `"H:MM:SS"`, `"MM:SS"` or a bare number of seconds. Never fails.
pub fn parse_duration_str(text: &str) -> u64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }

    if text.contains(':') {
        let mut total = 0.0;
        for part in text.split(':') {
            match part.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 0.0 => total = total * 60.0 + n,
                _ => return 0,
            }
        }
        return seconds_from_f64(total);
    }

    text.parse::<f64>().map(seconds_from_f64).unwrap_or(0)
}

/// Classify a state string as an absolute instant, a span, or neither
pub fn parse_timer_value(text: &str) -> TimerValue {
    let text = text.trim();
    if text.is_empty() {
        return TimerValue::Unknown;
    }
    if let Some(at) = parse_calendar_instant(text) {
        return TimerValue::Instant(at);
    }
    match parse_duration_str(text) {
        0 if !looks_like_zero(text) => TimerValue::Unknown,
        seconds => TimerValue::Seconds(seconds),
    }
}

fn looks_like_zero(text: &str) -> bool {
    text.chars().all(|c| c == '0' || c == ':' || c == '.')
}

fn seconds_from_f64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_colon_formats() {
        assert_eq!(parse_duration_str("1:30:15"), 5415);
        assert_eq!(parse_duration_str("05:00"), 300);
        assert_eq!(parse_duration_str("0:00:05.7"), 5);
    }

    #[test]
    fn test_numbers_and_numeric_strings() {
        assert_eq!(parse_duration(&json!(90)), 90);
        assert_eq!(parse_duration(&json!(90.9)), 90);
        assert_eq!(parse_duration(&json!("120")), 120);
        assert_eq!(parse_duration(&json!(-5)), 0);
    }

    #[test]
    fn test_garbage_is_zero() {
        assert_eq!(parse_duration_str("soon"), 0);
        assert_eq!(parse_duration_str("1:xx:00"), 0);
        assert_eq!(parse_duration(&json!(null)), 0);
        assert_eq!(parse_duration(&json!({ "minutes": 5 })), 0);
    }

    #[test]
    fn test_timer_value_classification() {
        assert_eq!(
            parse_timer_value("2024-05-01T12:00:00+00:00"),
            TimerValue::Instant(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(parse_timer_value("0:10:00"), TimerValue::Seconds(600));
        assert_eq!(parse_timer_value("45"), TimerValue::Seconds(45));
        assert_eq!(parse_timer_value("0"), TimerValue::Seconds(0));
        assert_eq!(parse_timer_value("unavailable"), TimerValue::Unknown);
    }
}
