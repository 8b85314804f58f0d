//! Watcher configuration read from the process environment
//!
//! - `LOG_FILE` - nginx access log to tail (default: `/var/log/nginx/access_real.log`)
//! - `SLACK_WEBHOOK_URL` - incoming webhook for alerts (unset: alerts are only logged)
//! - `ERROR_RATE_THRESHOLD` - alert at or above this 5xx percentage (default: 2.0)
//! - `WINDOW_SIZE` - number of recent requests in the error-rate window (default: 200)
//! - `ALERT_COOLDOWN_SEC` - minimum seconds between alerts of one type (default: 300)

use crate::config::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LOG_FILE: &str = "/var/log/nginx/access_real.log";
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 2.0;
pub const DEFAULT_WINDOW_SIZE: usize = 200;
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    pub log_file: PathBuf,
    pub slack_webhook_url: Option<String>,
    /// Percentage, e.g. `2.0` means 2% of the window
    pub error_rate_threshold: f64,
    pub window_size: usize,
    pub alert_cooldown: Duration,
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value,
                reason: "not a number",
            }),
        None => Ok(default),
    }
}

impl WatcherConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let error_rate_threshold = parse_or(
            non_empty("ERROR_RATE_THRESHOLD"),
            "ERROR_RATE_THRESHOLD",
            DEFAULT_ERROR_RATE_THRESHOLD,
        )?;
        if error_rate_threshold.is_nan() || error_rate_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "ERROR_RATE_THRESHOLD",
                value: error_rate_threshold.to_string(),
                reason: "must be a non-negative percentage",
            });
        }

        let window_size = parse_or(non_empty("WINDOW_SIZE"), "WINDOW_SIZE", DEFAULT_WINDOW_SIZE)?;
        if window_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WINDOW_SIZE",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }

        let cooldown_secs = parse_or(
            non_empty("ALERT_COOLDOWN_SEC"),
            "ALERT_COOLDOWN_SEC",
            DEFAULT_ALERT_COOLDOWN_SECS,
        )?;

        Ok(Self {
            log_file: non_empty("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            slack_webhook_url: non_empty("SLACK_WEBHOOK_URL"),
            error_rate_threshold,
            window_size,
            alert_cooldown: Duration::from_secs(cooldown_secs),
        })
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            slack_webhook_url: None,
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
            alert_cooldown: Duration::from_secs(DEFAULT_ALERT_COOLDOWN_SECS),
        }
    }
}
