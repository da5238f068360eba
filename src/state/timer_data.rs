//! Normalized timer snapshot shared by every timer source

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a timer as observed on one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Active,
    Paused,
    Finished,
}

/// Which integration produced the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerVendor {
    /// Native `timer.*` entity
    Standard,
    Alexa,
    Google,
}

/// Vendor-specific descriptive fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VendorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// User-defined timer label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Raw vendor status string (`ON`, `PAUSED`, `ringing`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_id: Option<String>,
}

/// A timer, however sourced, as seen on a single poll.
///
/// Built only through the status constructors, which keep the
/// finished/paused invariants: a finished timer has no time left, full
/// progress and no end instant; a paused timer has no end instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerData {
    entity_id: String,
    vendor: TimerVendor,
    status: TimerStatus,
    /// Original length in seconds, 0 when unknown
    duration: u64,
    /// Seconds left as of this poll
    remaining: u64,
    finishes_at: Option<DateTime<Utc>>,
    progress: f64,
    details: VendorDetails,
}

impl TimerData {
    /// Timer with nothing running
    pub fn idle(entity_id: &str, vendor: TimerVendor, duration: u64, remaining: u64) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            vendor,
            status: TimerStatus::Idle,
            duration,
            remaining,
            finishes_at: None,
            progress: 0.0,
            details: VendorDetails::default(),
        }
    }

    /// Running timer; `finishes_at` anchors the remaining time when known
    pub fn active(
        entity_id: &str,
        vendor: TimerVendor,
        duration: u64,
        remaining: u64,
        finishes_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            vendor,
            status: TimerStatus::Active,
            duration,
            remaining,
            finishes_at,
            progress: compute_progress(duration, remaining),
            details: VendorDetails::default(),
        }
    }

    pub fn paused(entity_id: &str, vendor: TimerVendor, duration: u64, remaining: u64) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            vendor,
            status: TimerStatus::Paused,
            duration,
            remaining,
            finishes_at: None,
            progress: compute_progress(duration, remaining),
            details: VendorDetails::default(),
        }
    }

    pub fn finished(entity_id: &str, vendor: TimerVendor, duration: u64) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            vendor,
            status: TimerStatus::Finished,
            duration,
            remaining: 0,
            finishes_at: None,
            progress: 100.0,
            details: VendorDetails::default(),
        }
    }

    /// Attach vendor-specific fields
    pub fn with_details(mut self, details: VendorDetails) -> Self {
        self.details = details;
        self
    }

    /// Override the computed progress; ignored for finished timers
    pub fn with_progress(mut self, progress: f64) -> Self {
        if self.status != TimerStatus::Finished {
            self.progress = clamp_percent(progress);
        }
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn vendor(&self) -> TimerVendor {
        self.vendor
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TimerStatus::Active
    }

    pub fn is_paused(&self) -> bool {
        self.status == TimerStatus::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.status == TimerStatus::Finished
    }

    pub fn is_idle(&self) -> bool {
        self.status == TimerStatus::Idle
    }

    pub fn is_alexa_timer(&self) -> bool {
        self.vendor == TimerVendor::Alexa
    }

    pub fn is_google_timer(&self) -> bool {
        self.vendor == TimerVendor::Google
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn finishes_at(&self) -> Option<DateTime<Utc>> {
        self.finishes_at
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn details(&self) -> &VendorDetails {
        &self.details
    }

    /// User label, falling back to the device name
    pub fn display_name(&self) -> Option<&str> {
        self.details
            .label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .or(self.details.device_name.as_deref().filter(|d| !d.trim().is_empty()))
    }
}

/// `(duration - remaining) / duration` as a percentage, 0 when duration is unknown
pub fn compute_progress(duration: u64, remaining: u64) -> f64 {
    if duration == 0 {
        return 0.0;
    }
    let elapsed = duration as f64 - remaining as f64;
    clamp_percent(elapsed / duration as f64 * 100.0)
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_constructor_holds_invariant() {
        let data = TimerData::finished("sensor.echo_next_timer", TimerVendor::Alexa, 300)
            .with_progress(12.0);
        assert!(data.is_finished());
        assert_eq!(data.remaining(), 0);
        assert_eq!(data.progress(), 100.0);
        assert!(data.finishes_at().is_none());
    }

    #[test]
    fn test_paused_has_no_end_instant() {
        let data = TimerData::paused("timer.tea", TimerVendor::Standard, 120, 30);
        assert!(data.is_paused());
        assert!(data.finishes_at().is_none());
        assert_eq!(data.progress(), 75.0);
    }

    #[test]
    fn test_progress_clamps_and_handles_unknown_duration() {
        assert_eq!(compute_progress(0, 10), 0.0);
        assert_eq!(compute_progress(60, 120), 0.0);
        assert_eq!(compute_progress(60, 0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
    }

    #[test]
    fn test_display_name_prefers_label_over_device() {
        let data = TimerData::idle("sensor.kitchen_timers", TimerVendor::Google, 0, 0).with_details(
            VendorDetails {
                device_name: Some("Kitchen".into()),
                label: Some("Pasta".into()),
                ..Default::default()
            },
        );
        assert_eq!(data.display_name(), Some("Pasta"));

        let unlabeled = TimerData::idle("sensor.kitchen_timers", TimerVendor::Google, 0, 0)
            .with_details(VendorDetails {
                device_name: Some("Kitchen".into()),
                label: Some("  ".into()),
                ..Default::default()
            });
        assert_eq!(unlabeled.display_name(), Some("Kitchen"));
    }
}
