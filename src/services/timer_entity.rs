//! Routing of timer entity ids to their adapters, plus vendor-agnostic helpers

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::state::{HostSnapshot, TimerCache, TimerData, TimerStatus, TimerVendor};
use super::{
    alexa_timer::{self, AlexaTimerSnapshot},
    google_timer::{self, GoogleTimerSnapshot, DEFAULT_FINISHED_RETENTION_SECS},
    localize::{translate, Localize},
    standard_timer::{standard_timer_data, StandardTimerSnapshot},
};

/// Status colors, one set per vendor
pub mod colors {
    pub const STANDARD_ACTIVE: &str = "#03A9F4";
    pub const STANDARD_PAUSED: &str = "#FF9800";
    pub const STANDARD_FINISHED: &str = "#4CAF50";
    pub const STANDARD_IDLE: &str = "#9E9E9E";

    pub const ALEXA_ACTIVE: &str = "#31C4F3";
    pub const ALEXA_PAUSED: &str = "#F5A623";
    pub const ALEXA_FINISHED: &str = "#4CAF50";
    pub const ALEXA_IDLE: &str = "#9E9E9E";

    pub const GOOGLE_ACTIVE: &str = "#4285F4";
    pub const GOOGLE_PAUSED: &str = "#FBBC04";
    pub const GOOGLE_FINISHED: &str = "#34A853";
    pub const GOOGLE_IDLE: &str = "#9AA0A6";
}

/// A timer entity decoded once into the shape its adapter expects
#[derive(Debug, Clone, PartialEq)]
pub enum TimerSnapshot {
    Standard(StandardTimerSnapshot),
    Alexa(AlexaTimerSnapshot),
    Google(GoogleTimerSnapshot),
}

/// Stateless router over the timer adapters.
///
/// The only memory involved is the injected [`TimerCache`].
#[derive(Debug, Clone)]
pub struct TimerEntityService {
    cache: Arc<TimerCache>,
    google_retention: Duration,
}

impl TimerEntityService {
    pub fn new(cache: Arc<TimerCache>) -> Self {
        Self {
            cache,
            google_retention: Duration::seconds(DEFAULT_FINISHED_RETENTION_SECS),
        }
    }

    /// Set how long a finished Google timer stays visible after leaving the list
    pub fn with_google_retention(mut self, retention: Duration) -> Self {
        self.google_retention = retention;
        self
    }

    pub fn cache(&self) -> &Arc<TimerCache> {
        &self.cache
    }

    /// Native `timer.*` entity
    pub fn is_timer_entity(entity_id: &str) -> bool {
        entity_id.starts_with("timer.")
    }

    /// Alexa `sensor.*_next_timer` entity
    pub fn is_alexa_timer(entity_id: &str) -> bool {
        let id = entity_id.to_ascii_lowercase();
        id.starts_with("sensor.")
            && (id.ends_with("_next_timer") || (id.contains("alexa") && id.contains("timer")))
    }

    /// Google Home `sensor.*_timers` entity
    pub fn is_google_timer(entity_id: &str) -> bool {
        let id = entity_id.to_ascii_lowercase();
        id.starts_with("sensor.")
            && (id.ends_with("_timers") || (id.contains("google") && id.contains("timer")))
    }

    /// Classify an entity id; native timers win over vendor patterns, Alexa over Google
    pub fn vendor_of(entity_id: &str) -> Option<TimerVendor> {
        if Self::is_timer_entity(entity_id) {
            Some(TimerVendor::Standard)
        } else if Self::is_alexa_timer(entity_id) {
            Some(TimerVendor::Alexa)
        } else if Self::is_google_timer(entity_id) {
            Some(TimerVendor::Google)
        } else {
            None
        }
    }

    /// Decode an entity into its typed snapshot
    pub fn snapshot(entity_id: &str, host: &HostSnapshot) -> Option<TimerSnapshot> {
        let entity = host.get(entity_id)?;
        Some(match Self::vendor_of(entity_id)? {
            TimerVendor::Standard => TimerSnapshot::Standard(StandardTimerSnapshot::from_entity(entity)),
            TimerVendor::Alexa => TimerSnapshot::Alexa(AlexaTimerSnapshot::from_entity(entity_id, entity)),
            TimerVendor::Google => TimerSnapshot::Google(GoogleTimerSnapshot::from_entity(entity_id, entity)),
        })
    }

    /// Normalize any supported timer entity. `None` for unrecognized or missing ids.
    pub fn get_timer_data(&self, entity_id: &str, host: &HostSnapshot, now: DateTime<Utc>) -> Option<TimerData> {
        let data = match Self::snapshot(entity_id, host)? {
            TimerSnapshot::Standard(snapshot) => standard_timer_data(entity_id, &snapshot, now),
            TimerSnapshot::Alexa(snapshot) => {
                alexa_timer::alexa_timer_data(entity_id, &snapshot, &self.cache, now)
            }
            TimerSnapshot::Google(snapshot) => google_timer::google_timer_data(
                entity_id,
                &snapshot,
                &self.cache,
                self.google_retention,
                now,
            ),
        };
        debug!(
            "{}: {:?} remaining={}s progress={:.1}%",
            entity_id,
            data.status(),
            data.remaining(),
            data.progress()
        );
        Some(data)
    }

    /// Alexa sensors with a running timer or a paused one with time left
    pub fn get_available_alexa_timers(&self, host: &HostSnapshot, now: DateTime<Utc>) -> Vec<String> {
        host.iter()
            .filter(|(id, _)| Self::vendor_of(id) == Some(TimerVendor::Alexa))
            .filter(|(id, entity)| {
                alexa_timer::has_discoverable_timer(&AlexaTimerSnapshot::from_entity(id, entity), now)
            })
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Google sensors listing at least one timer
    pub fn get_available_google_timers(&self, host: &HostSnapshot) -> Vec<String> {
        host.iter()
            .filter(|(id, _)| Self::vendor_of(id) == Some(TimerVendor::Google))
            .filter(|(id, entity)| {
                google_timer::has_discoverable_timer(&GoogleTimerSnapshot::from_entity(id, entity))
            })
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Whether the timer should be shown as expired
    pub fn is_timer_expired(data: &TimerData) -> bool {
        match data.vendor() {
            TimerVendor::Alexa | TimerVendor::Google => {
                data.is_finished() || (data.remaining() == 0 && data.progress() >= 100.0)
            }
            TimerVendor::Standard => !data.is_active() && !data.is_paused() && data.progress() >= 100.0,
        }
    }

    /// `H:MM:SS`, `H:MM`, `M:SS` or `Mm` depending on magnitude and `show_seconds`
    pub fn format_remaining_time(seconds: u64, show_seconds: bool) -> String {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;
        match (hours > 0, show_seconds) {
            (true, true) => format!("{}:{:02}:{:02}", hours, minutes, secs),
            (true, false) => format!("{}:{:02}", hours, minutes),
            (false, true) => format!("{}:{:02}", minutes, secs),
            (false, false) => format!("{}m", minutes),
        }
    }

    /// Human subtitle for a timer, preferring its label over the device name
    /// over a generic message
    pub fn get_timer_subtitle(
        data: &TimerData,
        show_seconds: bool,
        localize: Option<&dyn Localize>,
        compact: bool,
    ) -> String {
        let formatted = Self::format_remaining_time(data.remaining(), show_seconds);
        let time = formatted.as_str();
        let state = match data.status() {
            TimerStatus::Active => "active",
            TimerStatus::Paused => "paused",
            TimerStatus::Finished => "finished",
            TimerStatus::Idle => "none",
        };

        if compact {
            return translate(localize, &format!("timer.compact.{}", state), &[("time", time)]);
        }

        let details = data.details();
        let label = details.label.as_deref().filter(|l| !l.trim().is_empty());
        let device = details.device_name.as_deref().filter(|d| !d.trim().is_empty());

        let (vendor, variant, args): (&str, &str, Vec<(&str, &str)>) = match data.vendor() {
            TimerVendor::Standard => match data.display_name() {
                Some(name) => ("standard", "label", vec![("label", name), ("time", time)]),
                None => ("standard", "generic", vec![("time", time)]),
            },
            vendor => {
                let vendor = if vendor == TimerVendor::Alexa { "alexa" } else { "google" };
                match (label, device) {
                    (Some(label), _) if data.status() != TimerStatus::Idle => {
                        (vendor, "label", vec![("label", label), ("time", time)])
                    }
                    (_, Some(device)) => (vendor, "device", vec![("device", device), ("time", time)]),
                    _ => (vendor, "generic", vec![("time", time)]),
                }
            }
        };

        translate(localize, &format!("timer.{}.{}.{}", vendor, state, variant), &args)
    }

    /// Display color for a timer's vendor and state
    pub fn get_timer_state_color(data: &TimerData) -> &'static str {
        use colors::*;
        match (data.vendor(), data.status()) {
            (TimerVendor::Alexa, TimerStatus::Active) => ALEXA_ACTIVE,
            (TimerVendor::Alexa, TimerStatus::Paused) => ALEXA_PAUSED,
            (TimerVendor::Alexa, TimerStatus::Finished) => ALEXA_FINISHED,
            (TimerVendor::Alexa, TimerStatus::Idle) => ALEXA_IDLE,
            (TimerVendor::Google, TimerStatus::Active) => GOOGLE_ACTIVE,
            (TimerVendor::Google, TimerStatus::Paused) => GOOGLE_PAUSED,
            (TimerVendor::Google, TimerStatus::Finished) => GOOGLE_FINISHED,
            (TimerVendor::Google, TimerStatus::Idle) => GOOGLE_IDLE,
            (TimerVendor::Standard, TimerStatus::Active) => STANDARD_ACTIVE,
            (TimerVendor::Standard, TimerStatus::Paused) => STANDARD_PAUSED,
            (TimerVendor::Standard, TimerStatus::Finished) => STANDARD_FINISHED,
            (TimerVendor::Standard, TimerStatus::Idle) => STANDARD_IDLE,
        }
    }
}
