//! Countdown Engine - timer normalization and countdown computation for
//! smart-home dashboard cards
//! 
//! This library turns native, Alexa and Google timer entities, or a calendar
//! target, into one countdown with progress and subtitle text, and serves it
//! over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{ConfigError, ValidationError};
pub use services::{CountdownEngine, TimerEntityService};
pub use state::{AppState, CardConfig, CountdownState, HostSnapshot, TimerData};
pub use utils::signals::shutdown_signal;
