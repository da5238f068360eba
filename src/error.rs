//! Error types for the countdown engine.
//!
//! Bad timer data never produces an error: adapters and the engine degrade
//! to a valid snapshot instead. These types cover configuration that cannot
//! drive a countdown at all, and file loading.

use std::path::PathBuf;

use thiserror::Error;

/// Card configuration that cannot produce a countdown.
///
/// Surfaced to the display layer as a distinct error state rather than a
/// blank countdown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No target date, no timer entity, and no auto-discovery source.
    #[error("configuration needs a target_date, a timer_entity, or an auto-discovery source")]
    MissingSource,
}

impl ValidationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingSource => "missing_source",
        }
    }
}

/// Errors that can occur while loading configuration or snapshot files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Card configuration loaded but failed validation.
    #[error("invalid card configuration: {0}")]
    Invalid(#[from] ValidationError),
}
