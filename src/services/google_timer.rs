//! Google Home timer sensor adapter
//!
//! Google exposes a `sensor.*_timers` entity whose `timers` attribute is a
//! flat list. Fire times are epoch seconds and become null while a timer is
//! paused, and no remaining time is ever reported, so the adapter keeps its
//! own paused snapshots in the entity cache.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::state::{
    EntityState, PausedSnapshot, TimerCache, TimerData, TimerVendor, VendorDetails, VendorTimerCache,
};
use super::{
    alexa_timer::strip_suffix_ignore_case,
    dates::from_epoch_seconds,
    duration::parse_duration,
    standard_timer::{instant_after, seconds_until},
};

/// How long a finished timer stays on display after leaving the list
pub const DEFAULT_FINISHED_RETENTION_SECS: i64 = 30;

/// Google timer status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleTimerStatus {
    None,
    Set,
    Ringing,
    /// Any status other than the three above
    Paused,
}

impl GoogleTimerStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => GoogleTimerStatus::None,
            "set" => GoogleTimerStatus::Set,
            "ringing" => GoogleTimerStatus::Ringing,
            _ => GoogleTimerStatus::Paused,
        }
    }
}

/// One entry of the `timers` attribute
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleTimer {
    pub timer_id: String,
    pub status: GoogleTimerStatus,
    pub raw_status: String,
    /// Epoch seconds, absent while paused
    pub fire_time: Option<f64>,
    pub duration: u64,
    pub label: Option<String>,
}

impl GoogleTimer {
    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        self.fire_time.and_then(from_epoch_seconds)
    }

    fn has_fired(&self, now: DateTime<Utc>) -> bool {
        self.fire_at().is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Deserialize)]
struct RawGoogleTimer {
    #[serde(default)]
    timer_id: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    fire_time: Option<Value>,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    label: Option<String>,
}

/// Typed view of a Google timer sensor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoogleTimerSnapshot {
    pub timers: Vec<GoogleTimer>,
    pub device_name: Option<String>,
}

impl GoogleTimerSnapshot {
    pub fn from_entity(entity_id: &str, entity: &EntityState) -> Self {
        Self {
            timers: entity
                .attribute("timers")
                .map(|v| parse_timers(entity_id, v))
                .unwrap_or_default(),
            device_name: device_name(entity),
        }
    }
}

/// Parse the `timers` attribute, skipping entries without a usable `timer_id`
pub fn parse_timers(entity_id: &str, value: &Value) -> Vec<GoogleTimer> {
    let decoded;
    let list = match value {
        Value::Null => return Vec::new(),
        Value::Array(items) => items,
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            Ok(_) | Err(_) => {
                warn!("{}: timers attribute is not a JSON list, ignoring it", entity_id);
                return Vec::new();
            }
        },
        _ => {
            warn!("{}: unexpected timers shape, ignoring it", entity_id);
            return Vec::new();
        }
    };

    list.iter()
        .filter_map(|item| match parse_timer(item) {
            Some(timer) => Some(timer),
            None => {
                warn!("{}: skipping malformed timer entry {}", entity_id, item);
                None
            }
        })
        .collect()
}

fn parse_timer(item: &Value) -> Option<GoogleTimer> {
    let raw = serde_json::from_value::<RawGoogleTimer>(item.clone()).ok()?;
    let timer_id = match raw.timer_id? {
        Value::String(id) if !id.trim().is_empty() => id,
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let raw_status = raw.status.unwrap_or_else(|| "none".to_string());
    let fire_time = raw.fire_time.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    });

    Some(GoogleTimer {
        timer_id,
        status: GoogleTimerStatus::parse(&raw_status),
        raw_status,
        fire_time: fire_time.filter(|t| t.is_finite() && *t > 0.0),
        duration: raw.duration.as_ref().map(parse_duration).unwrap_or(0),
        label: raw.label.filter(|l| !l.trim().is_empty()),
    })
}

fn device_name(entity: &EntityState) -> Option<String> {
    let name = entity.friendly_name()?.trim();
    let stripped = strip_suffix_ignore_case(name, "timers").trim_end();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Normalize a Google timer sensor, updating the entity's cache entry.
///
/// Selection order: a ringing timer, then the cached finished timer, then
/// the `set` timer firing soonest, then a paused timer, then the first
/// entry as a degraded fallback.
pub fn google_timer_data(
    entity_id: &str,
    snapshot: &GoogleTimerSnapshot,
    cache: &TimerCache,
    retention: Duration,
    now: DateTime<Utc>,
) -> TimerData {
    let device = snapshot.device_name.as_deref();
    let timers = &snapshot.timers;

    cache.with_google(entity_id, |entry| {
        entry
            .paused_snapshots
            .retain(|id, _| timers.iter().any(|t| &t.timer_id == id));

        if let Some(ringing) = timers.iter().find(|t| t.status == GoogleTimerStatus::Ringing) {
            if entry.finished_timer_id.as_deref() != Some(ringing.timer_id.as_str()) {
                info!("{}: Google timer {} is ringing", entity_id, ringing.timer_id);
            }
            entry.pin_finished(&ringing.timer_id);
            entry.remember(ringing.duration, ringing.label.as_deref());
            return finished_data(entity_id, ringing, device);
        }

        if let Some(data) = cached_finished(entity_id, timers, entry, retention, device, now) {
            return data;
        }

        if let Some(set) = earliest_set(timers) {
            entry.remember(set.duration, set.label.as_deref());
            if set.has_fired(now) {
                info!("{}: Google timer {} passed its fire time", entity_id, set.timer_id);
                entry.pin_finished(&set.timer_id);
                return finished_data(entity_id, set, device);
            }

            let remaining = match set.fire_at() {
                Some(at) => seconds_until(at, now),
                None => entry
                    .paused_snapshots
                    .get(&set.timer_id)
                    .map(|snap| snap.remaining)
                    .unwrap_or(set.duration),
            };
            entry.paused_snapshots.insert(
                set.timer_id.clone(),
                PausedSnapshot {
                    remaining,
                    paused_at: now,
                    was_active: true,
                },
            );
            let finishes_at = set
                .fire_at()
                .or_else(|| instant_after(now, remaining));
            return TimerData::active(entity_id, TimerVendor::Google, set.duration, remaining, finishes_at)
                .with_details(details(set, device));
        }

        if let Some(paused) = timers.iter().find(|t| t.status == GoogleTimerStatus::Paused) {
            entry.remember(paused.duration, paused.label.as_deref());
            let remaining = paused_remaining(entity_id, paused, entry, now);
            return TimerData::paused(entity_id, TimerVendor::Google, paused.duration, remaining)
                .with_details(details(paused, device));
        }

        if let Some(first) = timers.first() {
            warn!(
                "{}: no timer matches a known state, showing {} (status '{}')",
                entity_id, first.timer_id, first.raw_status
            );
            return TimerData::idle(entity_id, TimerVendor::Google, first.duration, 0)
                .with_details(details(first, device));
        }

        TimerData::idle(entity_id, TimerVendor::Google, 0, 0).with_details(VendorDetails {
            device_name: device.map(str::to_string),
            ..VendorDetails::default()
        })
    })
}

/// Keep showing a finished timer while it is listed past its fire time, or
/// for the retention window after it leaves the list. A newly set timer
/// ends the finished view immediately.
fn cached_finished(
    entity_id: &str,
    timers: &[GoogleTimer],
    entry: &mut VendorTimerCache,
    retention: Duration,
    device: Option<&str>,
    now: DateTime<Utc>,
) -> Option<TimerData> {
    let finished_id = entry.finished_timer_id.clone()?;

    let newcomer = timers
        .iter()
        .any(|t| t.timer_id != finished_id && t.status == GoogleTimerStatus::Set);
    if newcomer {
        debug!("{}: new timer replaces finished timer {}", entity_id, finished_id);
        entry.clear_finished();
        return None;
    }

    if let Some(timer) = timers.iter().find(|t| t.timer_id == finished_id) {
        let past_fire_time = timer.fire_at().map_or(true, |at| at <= now);
        if past_fire_time && timer.status != GoogleTimerStatus::Paused {
            entry.finished_missing_since = None;
            return Some(finished_data(entity_id, timer, device));
        }
        debug!("{}: timer {} is running again", entity_id, finished_id);
        entry.clear_finished();
        return None;
    }

    let missing_since = *entry.finished_missing_since.get_or_insert(now);
    if now - missing_since < retention {
        let data = TimerData::finished(entity_id, TimerVendor::Google, entry.last_duration.unwrap_or(0))
            .with_details(VendorDetails {
                device_name: device.map(str::to_string),
                label: entry.last_label.clone(),
                status: None,
                timer_id: Some(finished_id),
            });
        return Some(data);
    }

    info!("{}: finished timer {} expired from display", entity_id, finished_id);
    entry.clear_finished();
    None
}

/// Frozen remaining time of a paused timer.
///
/// The value captured on the last running poll is replayed for as long as
/// the timer stays paused. A timer first seen already paused has no such
/// value and reports its full duration.
fn paused_remaining(
    entity_id: &str,
    timer: &GoogleTimer,
    entry: &mut VendorTimerCache,
    now: DateTime<Utc>,
) -> u64 {
    match entry.paused_snapshots.get(&timer.timer_id).copied() {
        Some(snapshot) if snapshot.was_active => {
            debug!(
                "{}: timer {} paused with {}s left",
                entity_id, timer.timer_id, snapshot.remaining
            );
            entry.paused_snapshots.insert(
                timer.timer_id.clone(),
                PausedSnapshot {
                    remaining: snapshot.remaining,
                    paused_at: now,
                    was_active: false,
                },
            );
            snapshot.remaining
        }
        Some(snapshot) => snapshot.remaining,
        None => {
            warn!(
                "{}: timer {} was already paused when first seen, assuming full duration",
                entity_id, timer.timer_id
            );
            entry.paused_snapshots.insert(
                timer.timer_id.clone(),
                PausedSnapshot {
                    remaining: timer.duration,
                    paused_at: now,
                    was_active: false,
                },
            );
            timer.duration
        }
    }
}

fn earliest_set(timers: &[GoogleTimer]) -> Option<&GoogleTimer> {
    timers
        .iter()
        .filter(|t| t.status == GoogleTimerStatus::Set)
        .min_by(|a, b| {
            let a = a.fire_time.unwrap_or(f64::MAX);
            let b = b.fire_time.unwrap_or(f64::MAX);
            a.total_cmp(&b)
        })
}

fn finished_data(entity_id: &str, timer: &GoogleTimer, device: Option<&str>) -> TimerData {
    TimerData::finished(entity_id, TimerVendor::Google, timer.duration).with_details(details(timer, device))
}

fn details(timer: &GoogleTimer, device: Option<&str>) -> VendorDetails {
    VendorDetails {
        device_name: device.map(str::to_string),
        label: timer.label.clone(),
        status: Some(timer.raw_status.clone()),
        timer_id: Some(timer.timer_id.clone()),
    }
}

/// Google sensors are discoverable whenever they list any timer
pub fn has_discoverable_timer(snapshot: &GoogleTimerSnapshot) -> bool {
    !snapshot.timers.is_empty()
}
