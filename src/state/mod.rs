//! State management module
//! 
//! This module contains the data model of the countdown engine and the
//! shared application state of the service.

pub mod app_state;
pub mod card_config;
pub mod countdown_state;
pub mod host;
pub mod timer_cache;
pub mod timer_data;

// Re-export main types
pub use app_state::{AppState, CountdownView, TickTicket, ViewError};
pub use card_config::{CardConfig, CompactFormat};
pub use countdown_state::CountdownState;
pub use host::{EntityState, HostSnapshot};
pub use timer_cache::{PausedSnapshot, TimerCache, VendorTimerCache};
pub use timer_data::{TimerData, TimerStatus, TimerVendor, VendorDetails};
