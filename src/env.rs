//! Environment variable names used to configure a logger without code.
//!
//! These are purely helpers; [`LoggerConfig`] itself never reads the
//! environment unless [`LoggerConfig::from_env`] is called.

use crate::error::ConfigError;
use crate::init::LoggerConfig;
use std::str::FromStr;

/// Path of the sink file. Required.
pub const FLUSH_LOGGER_PATH_ENV: &str = "FLUSH_LOGGER_PATH";

/// Batch window in milliseconds.
pub const FLUSH_LOGGER_TIME_LIMIT_MS_ENV: &str = "FLUSH_LOGGER_TIME_LIMIT_MS";

/// Entries per batch.
pub const FLUSH_LOGGER_ENTRY_LIMIT_ENV: &str = "FLUSH_LOGGER_ENTRY_LIMIT";

/// Append attempts per batch.
pub const FLUSH_LOGGER_MAX_ATTEMPTS_ENV: &str = "FLUSH_LOGGER_MAX_ATTEMPTS";

impl LoggerConfig {
    /// Build a config from `FLUSH_LOGGER_*` variables; unset optional
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup(FLUSH_LOGGER_PATH_ENV)
            .ok_or(ConfigError::MissingEnv(FLUSH_LOGGER_PATH_ENV))?;
        let mut config = LoggerConfig::new(path);

        if let Some(ms) = parse_var::<u64>(&lookup, FLUSH_LOGGER_TIME_LIMIT_MS_ENV)? {
            config = config.with_time_limit_ms(ms);
        }
        if let Some(limit) = parse_var::<usize>(&lookup, FLUSH_LOGGER_ENTRY_LIMIT_ENV)? {
            config = config.with_entry_limit(limit);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, FLUSH_LOGGER_MAX_ATTEMPTS_ENV)? {
            config = config.with_max_attempts(attempts);
        }
        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|source| ConfigError::InvalidEnv { key, value, source }),
    }
}
