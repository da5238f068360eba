//! Timer adapters and countdown services
//!
//! Vendor adapters normalize timer entities into [`TimerData`], the timer
//! entity service routes ids to them, and the countdown engine turns the
//! result (or a calendar target) into display state.
//!
//! [`TimerData`]: crate::state::TimerData

pub mod alexa_timer;
pub mod countdown;
pub mod dates;
pub mod duration;
pub mod google_timer;
pub mod localize;
pub mod resolver;
pub mod standard_timer;
pub mod timer_entity;

// Re-export main types
pub use countdown::{CountdownEngine, UnitMask};
pub use dates::{parse_to_timestamp, try_parse_timestamp};
pub use duration::{parse_duration, parse_duration_str};
pub use localize::{DefaultLocale, Localize};
pub use resolver::{resolve_config, SnapshotResolver, ValueResolver};
pub use timer_entity::{TimerEntityService, TimerSnapshot};
