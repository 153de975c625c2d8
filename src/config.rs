//! Configuration loaded from environment variables

use std::env;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Rest interval between cycles.
    pub update_interval: Duration,
    /// Per-source fetch timeout within a cycle.
    pub fetch_timeout: Duration,
    /// Buffer size of each subscriber channel.
    pub subscriber_buffer: usize,
    /// TomTom API key for the traffic adapter.
    pub tomtom_api_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Only TOMTOM_API_KEY is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let update_interval_secs = parse_u64("UPDATE_INTERVAL_SECS", 30)?;
        if update_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "UPDATE_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        let fetch_timeout_secs = parse_u64("FETCH_TIMEOUT_SECS", 10)?;
        if fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let subscriber_buffer = parse_u64("SUBSCRIBER_BUFFER", 32)? as usize;
        if subscriber_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "SUBSCRIBER_BUFFER must be at least 1".to_string(),
            ));
        }

        let tomtom_api_key = env::var("TOMTOM_API_KEY")
            .map_err(|_| ConfigError::MissingVariable("TOMTOM_API_KEY".to_string()))?;

        Ok(Self {
            update_interval: Duration::from_secs(update_interval_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            subscriber_buffer,
            tomtom_api_key,
        })
    }
}

fn parse_u64(var: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be an integer, got '{}'", var, value))
        }),
    }
}
