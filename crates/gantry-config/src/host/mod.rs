//! The host configuration record and its environment overrides.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{default_log_filter_string, default_log_format, default_shutdown_grace};
use crate::logging::LogFormat;

/// Environment variable overriding [`HostConfig::log_filter`].
pub const LOG_FILTER_ENV: &str = "GANTRY_LOG_FILTER";
/// Environment variable overriding [`HostConfig::log_format`].
pub const LOG_FORMAT_ENV: &str = "GANTRY_LOG_FORMAT";
/// Environment variable overriding [`HostConfig::call_timeout`], in milliseconds.
pub const CALL_TIMEOUT_ENV: &str = "GANTRY_CALL_TIMEOUT_MS";
/// Environment variable overriding [`HostConfig::shutdown_grace`], in milliseconds.
pub const SHUTDOWN_GRACE_ENV: &str = "GANTRY_SHUTDOWN_GRACE_MS";

/// Settings shared by the plugin host and its telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// `tracing` filter directive, e.g. `info` or `gantry_plugin=debug`.
    pub log_filter: String,
    /// Log record format.
    pub log_format: LogFormat,
    /// Deadline applied to every request scope, if any.
    pub call_timeout: Option<Duration>,
    /// How long a plugin may take to exit once its channel is closed.
    pub shutdown_grace: Duration,
    /// Variables set for every launched plugin, over the inherited environment.
    pub plugin_env: BTreeMap<String, String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            call_timeout: None,
            shutdown_grace: default_shutdown_grace(),
            plugin_env: BTreeMap::new(),
        }
    }
}

impl HostConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any recognised variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults overridden by `lookup`.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first malformed variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(filter) = read(LOG_FILTER_ENV) {
            config.log_filter = filter;
        }
        if let Some(format) = read(LOG_FORMAT_ENV) {
            config.log_format =
                format
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidLogFormat {
                        value: format.clone(),
                        source,
                    })?;
        }
        if let Some(timeout) = read(CALL_TIMEOUT_ENV) {
            config.call_timeout = Some(parse_millis(CALL_TIMEOUT_ENV, &timeout)?);
        }
        if let Some(grace) = read(SHUTDOWN_GRACE_ENV) {
            config.shutdown_grace = parse_millis(SHUTDOWN_GRACE_ENV, &grace)?;
        }
        Ok(config)
    }

    /// Adds a variable to the plugin environment.
    #[must_use]
    pub fn with_plugin_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plugin_env.insert(key.into(), value.into());
        self
    }
}

fn parse_millis(variable: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|source| ConfigError::InvalidMillis {
            variable,
            value: raw.to_owned(),
            source,
        })
}

/// Errors raised while building a [`HostConfig`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The log format was not `json` or `compact`.
    #[error("GANTRY_LOG_FORMAT must be `json` or `compact`, got '{value}'")]
    InvalidLogFormat {
        /// The rejected text.
        value: String,
        /// Parser failure.
        #[source]
        source: strum::ParseError,
    },
    /// A duration variable was not a whole number of milliseconds.
    #[error("{variable} must be a whole number of milliseconds, got '{value}'")]
    InvalidMillis {
        /// The offending variable.
        variable: &'static str,
        /// The rejected text.
        value: String,
        /// Parser failure.
        #[source]
        source: std::num::ParseIntError,
    },
}
