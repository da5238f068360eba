//! Countdown breakdown structure

use serde::{Deserialize, Serialize};

/// Remaining time split into display units.
///
/// Units the card configuration disables are zero and their magnitude is
/// carried by the next enabled smaller unit. `total_ms` is always the true
/// remaining time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_ms: u64,
}

impl CountdownState {
    /// All-zero state used for expired and "no countdown" displays
    pub fn zero() -> Self {
        Self::default()
    }

    /// Check if nothing remains
    pub fn is_zero(&self) -> bool {
        self.total_ms == 0
    }
}
