//! Native `timer.*` entity adapter

use chrono::{DateTime, Utc};

use crate::state::{EntityState, TimerData, TimerVendor, VendorDetails};
use super::{dates::try_parse_timestamp, duration::parse_duration};

/// Host-reported state of a native timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardTimerState {
    Idle,
    Active,
    Paused,
}

/// Typed view of a native timer entity
#[derive(Debug, Clone, PartialEq)]
pub struct StandardTimerSnapshot {
    pub state: StandardTimerState,
    pub duration: u64,
    pub finishes_at: Option<DateTime<Utc>>,
    /// `remaining` attribute in seconds, already fresh as reported by the host
    pub remaining: Option<u64>,
    pub friendly_name: Option<String>,
}

impl StandardTimerSnapshot {
    pub fn from_entity(entity: &EntityState) -> Self {
        let state = match entity.state.as_str() {
            "active" => StandardTimerState::Active,
            "paused" => StandardTimerState::Paused,
            _ => StandardTimerState::Idle,
        };
        Self {
            state,
            duration: entity.attribute("duration").map(parse_duration).unwrap_or(0),
            finishes_at: entity.attribute_str("finishes_at").and_then(try_parse_timestamp),
            remaining: entity.attribute("remaining").map(parse_duration),
            friendly_name: entity.friendly_name().map(str::to_string),
        }
    }
}

/// Normalize a native timer.
///
/// While active or paused, remaining time is recomputed from `finishes_at`
/// when present; otherwise the `remaining` attribute is used verbatim.
pub fn standard_timer_data(
    entity_id: &str,
    snapshot: &StandardTimerSnapshot,
    now: DateTime<Utc>,
) -> TimerData {
    let details = VendorDetails {
        device_name: snapshot.friendly_name.clone(),
        ..VendorDetails::default()
    };
    let attribute_remaining = snapshot.remaining.unwrap_or(0);

    let data = match snapshot.state {
        StandardTimerState::Idle => {
            TimerData::idle(entity_id, TimerVendor::Standard, snapshot.duration, attribute_remaining)
        }
        StandardTimerState::Active => {
            let remaining = snapshot
                .finishes_at
                .map(|end| seconds_until(end, now))
                .unwrap_or(attribute_remaining);
            let finishes_at = snapshot
                .finishes_at
                .or_else(|| instant_after(now, remaining));
            TimerData::active(entity_id, TimerVendor::Standard, snapshot.duration, remaining, finishes_at)
        }
        StandardTimerState::Paused => {
            let remaining = snapshot
                .finishes_at
                .map(|end| seconds_until(end, now))
                .unwrap_or(attribute_remaining);
            TimerData::paused(entity_id, TimerVendor::Standard, snapshot.duration, remaining)
        }
    };
    data.with_details(details)
}

/// Whole seconds from `now` until `end`, never negative
pub fn seconds_until(end: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (end - now).num_milliseconds().max(0) as u64 / 1000
}

/// `now` plus `seconds`, or `None` when the result is out of range
pub fn instant_after(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerStatus;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn parse(entity: EntityState) -> TimerData {
        standard_timer_data("timer.pasta", &StandardTimerSnapshot::from_entity(&entity), now())
    }

    #[test]
    fn test_active_uses_finishes_at() {
        let finishes = now() + Duration::seconds(90);
        let data = parse(
            EntityState::new("active")
                .with_attribute("duration", json!("0:05:00"))
                .with_attribute("remaining", json!("0:04:59"))
                .with_attribute("finishes_at", json!(finishes.to_rfc3339())),
        );
        assert_eq!(data.status(), TimerStatus::Active);
        assert_eq!(data.remaining(), 90);
        assert_eq!(data.duration(), 300);
        assert_eq!(data.finishes_at(), Some(finishes));
        assert_eq!(data.progress(), 70.0);
    }

    #[test]
    fn test_active_without_finishes_at_uses_remaining_attribute() {
        let data = parse(
            EntityState::new("active")
                .with_attribute("duration", json!("0:01:00"))
                .with_attribute("remaining", json!("0:00:15")),
        );
        assert_eq!(data.remaining(), 15);
        assert_eq!(data.progress(), 75.0);
        assert_eq!(data.finishes_at(), Some(now() + Duration::seconds(15)));
    }

    #[test]
    fn test_paused_reports_no_end_instant() {
        let data = parse(
            EntityState::new("paused")
                .with_attribute("duration", json!("0:02:00"))
                .with_attribute("remaining", json!("0:01:00")),
        );
        assert!(data.is_paused());
        assert_eq!(data.remaining(), 60);
        assert!(data.finishes_at().is_none());
        assert_eq!(data.progress(), 50.0);
    }

    #[test]
    fn test_idle_has_zero_progress() {
        let data = parse(
            EntityState::new("idle")
                .with_attribute("duration", json!("0:02:00"))
                .with_attribute("friendly_name", json!("Pasta")),
        );
        assert!(data.is_idle());
        assert_eq!(data.progress(), 0.0);
        assert_eq!(data.display_name(), Some("Pasta"));
    }

    #[test]
    fn test_past_finish_clamps_to_zero() {
        let data = parse(
            EntityState::new("active")
                .with_attribute("duration", json!(60))
                .with_attribute("finishes_at", json!((now() - Duration::seconds(5)).to_rfc3339())),
        );
        assert_eq!(data.remaining(), 0);
        assert_eq!(data.progress(), 100.0);
    }

    #[test]
    fn test_remaining_beyond_calendar_range_has_no_end_instant() {
        let data = parse(
            EntityState::new("active")
                .with_attribute("duration", json!(60))
                .with_attribute("remaining", json!("1000000000000000")),
        );
        assert!(data.is_active());
        assert_eq!(data.remaining(), 1_000_000_000_000_000);
        assert_eq!(data.finishes_at(), None);
        assert_eq!(data.progress(), 0.0);

        let saturated = parse(EntityState::new("active").with_attribute("remaining", json!(1e300)));
        assert_eq!(saturated.remaining(), u64::MAX);
        assert_eq!(saturated.finishes_at(), None);
    }

    #[test]
    fn test_instant_after_stays_in_range() {
        assert_eq!(instant_after(now(), 15), Some(now() + Duration::seconds(15)));
        assert_eq!(instant_after(now(), 1_000_000_000_000_000), None);
        assert_eq!(instant_after(now(), u64::MAX), None);
    }
}
