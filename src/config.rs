//! Configuration and CLI argument handling

use std::{fs, path::{Path, PathBuf}, time::Duration};

use clap::Parser;
use serde::de::DeserializeOwned;

use crate::{
    error::ConfigError,
    services::google_timer::DEFAULT_FINISHED_RETENTION_SECS,
    state::{CardConfig, HostSnapshot},
};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "countdown-engine")]
#[command(about = "Countdown and timer engine for smart-home dashboard cards")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// JSON file with the card configuration
    #[arg(long)]
    pub card_config: Option<PathBuf>,

    /// JSON file with the host entity-state snapshot
    #[arg(long)]
    pub snapshot_file: Option<PathBuf>,

    /// How often to re-read the snapshot file, in seconds
    #[arg(long, default_value = "5")]
    pub snapshot_reload_secs: u64,

    /// Countdown tick period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_millis: u64,

    /// How long a finished Google timer stays visible after leaving the list
    #[arg(long, default_value_t = DEFAULT_FINISHED_RETENTION_SECS)]
    pub google_retention_secs: i64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    pub fn snapshot_reload_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_reload_secs.max(1))
    }

    /// Saturates at `chrono::Duration::MAX` for values too large to represent
    pub fn google_retention(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.google_retention_secs.max(0)).unwrap_or(chrono::Duration::MAX)
    }

    /// Card configuration from `--card-config`, or the default (sourceless) one
    pub fn load_card_config(&self) -> Result<CardConfig, ConfigError> {
        match &self.card_config {
            Some(path) => load_card_config(path),
            None => Ok(CardConfig::default()),
        }
    }
}

/// Read and validate a card configuration file
pub fn load_card_config(path: &Path) -> Result<CardConfig, ConfigError> {
    let config: CardConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

/// Read a host snapshot file
pub fn load_snapshot(path: &Path) -> Result<HostSnapshot, ConfigError> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
