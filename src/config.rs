//! Server configuration read from the process environment
//!
//! - `APP_POOL` - pool identifier (default: `unknown`)
//! - `RELEASE_ID` - release identifier (default: `unknown`)
//! - `PORT` - listen port (default: 3000)
//!
//! A variable that is set but empty counts as unset.

use thiserror::Error;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Placeholder for pool and release when not configured
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid PORT value '{0}': expected an integer between 0 and 65535")]
    InvalidPort(String),

    #[error("Invalid {key} value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Immutable server configuration, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub pool: String,
    pub release_id: String,
    pub port: u16,
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of touching
    /// the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            pool: non_empty("APP_POOL").unwrap_or_else(|| UNKNOWN.to_string()),
            release_id: non_empty("RELEASE_ID").unwrap_or_else(|| UNKNOWN.to_string()),
            port,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pool: UNKNOWN.to_string(),
            release_id: UNKNOWN.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
