//! Per-entity memory for vendor timer adapters
//!
//! Vendor timer lists drop finished and paused timers without warning. The
//! cache is the only place a vanished timer id is remembered between polls.
//! It is owned by whoever constructs the timer service and lives until
//! evicted or cleared.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use tracing::debug;

/// Remaining time captured for a vendor timer that cannot report it while paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedSnapshot {
    pub remaining: u64,
    /// When the snapshot was last written
    pub paused_at: DateTime<Utc>,
    /// Whether the timer was running when the snapshot was written
    pub was_active: bool,
}

/// Cached state for one vendor timer entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorTimerCache {
    /// Timer id pinned as finished
    pub finished_timer_id: Option<String>,
    /// First poll on which the pinned id was missing from the vendor list
    pub finished_missing_since: Option<DateTime<Utc>>,
    pub last_duration: Option<u64>,
    pub last_label: Option<String>,
    pub paused_snapshots: HashMap<String, PausedSnapshot>,
}

impl VendorTimerCache {
    /// Drop the finished pin and its bookkeeping
    pub fn clear_finished(&mut self) {
        self.finished_timer_id = None;
        self.finished_missing_since = None;
    }

    /// Pin `timer_id` as the finished timer
    pub fn pin_finished(&mut self, timer_id: &str) {
        if self.finished_timer_id.as_deref() != Some(timer_id) {
            self.finished_timer_id = Some(timer_id.to_string());
        }
        self.finished_missing_since = None;
    }

    /// Remember the descriptive fields of the current primary timer
    pub fn remember(&mut self, duration: u64, label: Option<&str>) {
        if duration > 0 {
            self.last_duration = Some(duration);
        }
        if let Some(label) = label {
            self.last_label = Some(label.to_string());
        }
    }
}

/// Adapter caches for Alexa and Google timer entities, one lock per vendor map
#[derive(Debug, Default)]
pub struct TimerCache {
    alexa: Mutex<HashMap<String, VendorTimerCache>>,
    google: Mutex<HashMap<String, VendorTimerCache>>,
}

impl TimerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the Alexa cache entry of `entity_id`, creating it lazily
    pub fn with_alexa<R>(&self, entity_id: &str, f: impl FnOnce(&mut VendorTimerCache) -> R) -> R {
        let mut map = lock(&self.alexa);
        f(map.entry(entity_id.to_string()).or_default())
    }

    /// Run `f` against the Google cache entry of `entity_id`, creating it lazily
    pub fn with_google<R>(&self, entity_id: &str, f: impl FnOnce(&mut VendorTimerCache) -> R) -> R {
        let mut map = lock(&self.google);
        f(map.entry(entity_id.to_string()).or_default())
    }

    /// Copy of the Alexa entry, if one exists
    pub fn alexa_entry(&self, entity_id: &str) -> Option<VendorTimerCache> {
        lock(&self.alexa).get(entity_id).cloned()
    }

    /// Copy of the Google entry, if one exists
    pub fn google_entry(&self, entity_id: &str) -> Option<VendorTimerCache> {
        lock(&self.google).get(entity_id).cloned()
    }

    /// Forget everything cached for `entity_id`. Returns whether anything was removed.
    pub fn evict(&self, entity_id: &str) -> bool {
        let alexa = lock(&self.alexa).remove(entity_id).is_some();
        let google = lock(&self.google).remove(entity_id).is_some();
        if alexa || google {
            debug!("Evicted timer cache for {}", entity_id);
        }
        alexa || google
    }

    /// Forget every cached entity
    pub fn clear(&self) {
        lock(&self.alexa).clear();
        lock(&self.google).clear();
        debug!("Cleared all timer caches");
    }

    /// Number of cached entities across both vendors
    pub fn len(&self) -> usize {
        lock(&self.alexa).len() + lock(&self.google).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A panic while holding the lock leaves a map that is still structurally valid.
fn lock(map: &Mutex<HashMap<String, VendorTimerCache>>) -> MutexGuard<'_, HashMap<String, VendorTimerCache>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_created_lazily_and_evicted() {
        let cache = TimerCache::new();
        assert!(cache.is_empty());

        cache.with_alexa("sensor.echo_next_timer", |entry| entry.pin_finished("abc"));
        cache.with_google("sensor.nest_timers", |entry| entry.remember(300, Some("Tea")));
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache
                .alexa_entry("sensor.echo_next_timer")
                .and_then(|e| e.finished_timer_id),
            Some("abc".to_string())
        );

        assert!(cache.evict("sensor.echo_next_timer"));
        assert!(!cache.evict("sensor.echo_next_timer"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.google_entry("sensor.nest_timers").is_none());
    }

    #[test]
    fn test_remember_ignores_unknown_duration() {
        let mut entry = VendorTimerCache::default();
        entry.remember(120, None);
        entry.remember(0, Some("Eggs"));
        assert_eq!(entry.last_duration, Some(120));
        assert_eq!(entry.last_label.as_deref(), Some("Eggs"));
    }
}
