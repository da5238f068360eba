//! Alexa timer sensor adapter
//!
//! Alexa exposes a `sensor.*_next_timer` entity whose `sorted_active` and
//! `sorted_all` attributes hold `[id, timer]` pairs. Timer objects carry a
//! remaining-time snapshot, the absolute trigger time, and the original
//! duration, all in milliseconds. Older integration versions expose only a
//! bare state, handled by the legacy path.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::state::{EntityState, TimerCache, TimerData, TimerVendor, VendorDetails};
use super::{
    dates::from_epoch_millis,
    duration::{parse_duration, parse_timer_value, TimerValue},
    standard_timer::{instant_after, seconds_until},
};

const STATUS_OFF: &str = "OFF";
const STATUS_PAUSED: &str = "PAUSED";

/// One Alexa timer object as found in `sorted_active` / `sorted_all`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexaTimer {
    /// Remaining milliseconds as of the vendor's last update
    #[serde(default)]
    pub remaining_time: Option<f64>,
    #[serde(default)]
    pub original_duration_in_millis: Option<f64>,
    /// Absolute epoch milliseconds at which the timer rings
    #[serde(default)]
    pub trigger_time: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timer_label: Option<String>,
    #[serde(default)]
    pub last_updated_date: Option<f64>,
}

impl AlexaTimer {
    fn status_is(&self, status: &str) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(status))
    }

    pub fn is_paused(&self) -> bool {
        self.status_is(STATUS_PAUSED)
    }

    /// `OFF` with nothing left: the vendor already considers it rung
    pub fn is_spent(&self) -> bool {
        self.status_is(STATUS_OFF) && self.remaining_time.unwrap_or(0.0) <= 0.0
    }

    /// Original duration in whole seconds, 0 when unknown
    pub fn duration_secs(&self) -> u64 {
        self.original_duration_in_millis
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| (ms / 1000.0).floor() as u64)
            .unwrap_or(0)
    }

    /// Snapshot remaining in whole seconds
    pub fn snapshot_remaining_secs(&self) -> u64 {
        self.remaining_time
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| (ms / 1000.0).floor() as u64)
            .unwrap_or(0)
    }

    pub fn trigger_at(&self) -> Option<DateTime<Utc>> {
        self.trigger_time.and_then(from_epoch_millis)
    }

    /// Live remaining time. The absolute trigger time is preferred since it
    /// does not drift between polls.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.trigger_at() {
            Some(trigger) => seconds_until(trigger, now),
            None => self.snapshot_remaining_secs(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.timer_label.as_deref().filter(|l| !l.trim().is_empty())
    }
}

/// An `[id, timer]` pair
#[derive(Debug, Clone, PartialEq)]
pub struct AlexaEntry {
    pub id: String,
    pub timer: AlexaTimer,
}

/// Typed view of an Alexa timer sensor
#[derive(Debug, Clone, PartialEq)]
pub enum AlexaTimerSnapshot {
    Rich {
        active: Vec<AlexaEntry>,
        all: Vec<AlexaEntry>,
        device_name: Option<String>,
    },
    /// Older integrations: only `state` and maybe `attributes.duration`
    Legacy {
        state: String,
        duration: Option<u64>,
        last_changed: Option<DateTime<Utc>>,
        device_name: Option<String>,
    },
}

impl AlexaTimerSnapshot {
    pub fn from_entity(entity_id: &str, entity: &EntityState) -> Self {
        let device_name = device_name(entity);
        let active = entity.attribute("sorted_active");
        let all = entity.attribute("sorted_all");

        if active.is_none() && all.is_none() {
            return AlexaTimerSnapshot::Legacy {
                state: entity.state.clone(),
                duration: entity
                    .attribute("duration")
                    .map(parse_duration)
                    .filter(|d| *d > 0),
                last_changed: entity.last_changed,
                device_name,
            };
        }

        AlexaTimerSnapshot::Rich {
            active: active
                .map(|v| parse_timer_list(entity_id, "sorted_active", v))
                .unwrap_or_default(),
            all: all
                .map(|v| parse_timer_list(entity_id, "sorted_all", v))
                .unwrap_or_default(),
            device_name,
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        match self {
            AlexaTimerSnapshot::Rich { device_name, .. }
            | AlexaTimerSnapshot::Legacy { device_name, .. } => device_name.as_deref(),
        }
    }
}

/// Parse a `sorted_*` attribute given either as a JSON array or a JSON string.
/// Malformed entries are skipped.
pub fn parse_timer_list(entity_id: &str, attribute: &str, value: &Value) -> Vec<AlexaEntry> {
    let decoded;
    let list = match value {
        Value::Null => return Vec::new(),
        Value::Array(items) => items,
        Value::String(raw) => {
            if raw.trim().is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(items)) => {
                    decoded = items;
                    &decoded
                }
                Ok(_) | Err(_) => {
                    warn!("{}: {} is not a JSON list, ignoring it", entity_id, attribute);
                    return Vec::new();
                }
            }
        }
        _ => {
            warn!("{}: unexpected {} shape, ignoring it", entity_id, attribute);
            return Vec::new();
        }
    };

    list.iter()
        .filter_map(|item| match parse_entry(item) {
            Some(entry) => Some(entry),
            None => {
                warn!("{}: skipping malformed {} entry", entity_id, attribute);
                None
            }
        })
        .collect()
}

fn parse_entry(item: &Value) -> Option<AlexaEntry> {
    let pair = item.as_array()?;
    let id = match pair.first()? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let timer = serde_json::from_value::<AlexaTimer>(pair.get(1)?.clone()).ok()?;
    Some(AlexaEntry { id, timer })
}

fn device_name(entity: &EntityState) -> Option<String> {
    let name = entity.friendly_name()?.trim();
    let stripped = strip_suffix_ignore_case(name, "next timer").trim_end();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

pub(crate) fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    if text.len() >= suffix.len() {
        let split = text.len() - suffix.len();
        if text.is_char_boundary(split) && text[split..].eq_ignore_ascii_case(suffix) {
            return &text[..split];
        }
    }
    text
}

/// Normalize an Alexa timer sensor, updating the entity's cache entry
pub fn alexa_timer_data(
    entity_id: &str,
    snapshot: &AlexaTimerSnapshot,
    cache: &TimerCache,
    now: DateTime<Utc>,
) -> TimerData {
    match snapshot {
        AlexaTimerSnapshot::Rich {
            active,
            all,
            device_name,
        } => cache.with_alexa(entity_id, |entry| {
            let device = device_name.as_deref();

            // A timer that rang while still listed stays pinned as finished,
            // even if another listed timer is running.
            if let Some(pinned) = entry.finished_timer_id.clone() {
                if let Some(finished) = active.iter().find(|e| e.id == pinned) {
                    entry.remember(finished.timer.duration_secs(), finished.timer.label());
                    return finished_data(entity_id, finished, device);
                }
                debug!("{}: finished timer {} left the active list", entity_id, pinned);
                entry.clear_finished();
            }

            if let Some(primary) = select_active(active) {
                let timer = &primary.timer;
                let duration = timer.duration_secs();
                let remaining = timer.remaining_secs(now);
                entry.remember(duration, timer.label());

                if is_finished(timer, remaining, now) {
                    info!("{}: Alexa timer {} finished", entity_id, primary.id);
                    entry.pin_finished(&primary.id);
                    return finished_data(entity_id, primary, device);
                }

                let finishes_at = timer
                    .trigger_at()
                    .or_else(|| instant_after(now, remaining));
                return TimerData::active(entity_id, TimerVendor::Alexa, duration, remaining, finishes_at)
                    .with_details(details(primary, device));
            }

            if let Some(paused) = select_paused(active, all) {
                let timer = &paused.timer;
                entry.remember(timer.duration_secs(), timer.label());
                return TimerData::paused(
                    entity_id,
                    TimerVendor::Alexa,
                    timer.duration_secs(),
                    timer.snapshot_remaining_secs(),
                )
                .with_details(details(paused, device));
            }

            no_timer(entity_id, device)
        }),
        AlexaTimerSnapshot::Legacy {
            state,
            duration,
            last_changed,
            device_name,
        } => legacy_timer_data(entity_id, state, *duration, *last_changed, device_name.as_deref(), now),
    }
}

/// Legacy sensors expose only a state that may be an end timestamp, raw
/// seconds, or `H:MM:SS`. Without an original duration the progress is
/// reported as 0 rather than guessed.
fn legacy_timer_data(
    entity_id: &str,
    state: &str,
    duration: Option<u64>,
    last_changed: Option<DateTime<Utc>>,
    device_name: Option<&str>,
    now: DateTime<Utc>,
) -> TimerData {
    let details = VendorDetails {
        device_name: device_name.map(str::to_string),
        ..VendorDetails::default()
    };

    let data = match parse_timer_value(state) {
        TimerValue::Instant(end) => {
            // Best guess: the state last changed when the timer was set.
            let duration = duration
                .or_else(|| {
                    last_changed
                        .filter(|changed| *changed < end)
                        .map(|changed| seconds_until(end, changed))
                })
                .unwrap_or(0);
            if end <= now {
                TimerData::finished(entity_id, TimerVendor::Alexa, duration)
            } else {
                let remaining = seconds_until(end, now);
                TimerData::active(entity_id, TimerVendor::Alexa, duration, remaining, Some(end))
            }
        }
        TimerValue::Seconds(0) | TimerValue::Unknown => {
            TimerData::idle(entity_id, TimerVendor::Alexa, duration.unwrap_or(0), 0)
        }
        TimerValue::Seconds(remaining) => TimerData::active(
            entity_id,
            TimerVendor::Alexa,
            duration.unwrap_or(0),
            remaining,
            instant_after(now, remaining),
        ),
    };
    data.with_details(details)
}

/// Running timers, soonest to finish first when more than one
fn select_active(active: &[AlexaEntry]) -> Option<&AlexaEntry> {
    let mut running = active.iter().filter(|e| !e.timer.is_paused());
    let first = running.next()?;
    Some(running.fold(first, |best, candidate| {
        let best_ms = best.timer.remaining_time.unwrap_or(f64::MAX);
        let candidate_ms = candidate.timer.remaining_time.unwrap_or(f64::MAX);
        if candidate_ms.total_cmp(&best_ms).is_lt() {
            candidate
        } else {
            best
        }
    }))
}

/// Most recently updated paused timer
fn select_paused<'a>(active: &'a [AlexaEntry], all: &'a [AlexaEntry]) -> Option<&'a AlexaEntry> {
    all.iter()
        .chain(active.iter())
        .filter(|e| e.timer.is_paused())
        .fold(None, |best: Option<&AlexaEntry>, candidate| match best {
            Some(best)
                if best.timer.last_updated_date.unwrap_or(f64::MIN)
                    >= candidate.timer.last_updated_date.unwrap_or(f64::MIN) =>
            {
                Some(best)
            }
            _ => Some(candidate),
        })
}

fn is_finished(timer: &AlexaTimer, remaining: u64, now: DateTime<Utc>) -> bool {
    timer.trigger_at().is_some_and(|trigger| trigger <= now) || remaining == 0 || timer.is_spent()
}

fn finished_data(entity_id: &str, entry: &AlexaEntry, device: Option<&str>) -> TimerData {
    TimerData::finished(entity_id, TimerVendor::Alexa, entry.timer.duration_secs())
        .with_details(details(entry, device))
}

fn no_timer(entity_id: &str, device: Option<&str>) -> TimerData {
    TimerData::idle(entity_id, TimerVendor::Alexa, 0, 0).with_details(VendorDetails {
        device_name: device.map(str::to_string),
        ..VendorDetails::default()
    })
}

fn details(entry: &AlexaEntry, device: Option<&str>) -> VendorDetails {
    VendorDetails {
        device_name: device.map(str::to_string),
        label: entry.timer.label().map(str::to_string),
        status: entry.timer.status.clone(),
        timer_id: Some(entry.id.clone()),
    }
}

/// Whether an Alexa sensor has a running timer or a paused one with time left
pub fn has_discoverable_timer(snapshot: &AlexaTimerSnapshot, now: DateTime<Utc>) -> bool {
    match snapshot {
        AlexaTimerSnapshot::Rich { active, all, .. } => {
            let running = active
                .iter()
                .any(|e| !e.timer.is_paused() && !e.timer.is_spent());
            let paused = all
                .iter()
                .chain(active.iter())
                .any(|e| e.timer.is_paused() && e.timer.snapshot_remaining_secs() > 0);
            running || paused
        }
        AlexaTimerSnapshot::Legacy { state, .. } => match parse_timer_value(state) {
            TimerValue::Instant(end) => end > now,
            TimerValue::Seconds(seconds) => seconds > 0,
            TimerValue::Unknown => false,
        },
    }
}
