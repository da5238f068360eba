//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown_ticker;
pub mod snapshot_reload;

// Re-export main functions
pub use countdown_ticker::countdown_ticker_task;
pub use snapshot_reload::snapshot_reload_task;
