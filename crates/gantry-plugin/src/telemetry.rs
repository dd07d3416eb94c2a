//! Structured telemetry initialisation for the plugin host.

use std::io::{self, IsTerminal};

use gantry_config::{HostConfig, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state again. Plugin stderr relayed by
/// [`PluginProcess`](crate::process::PluginProcess) and messages logged
/// through [`Host::log`](crate::host::Host::log) flow through the same
/// subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] if another subscriber is already installed.
///
/// # Examples
///
/// ```rust
/// use gantry_config::HostConfig;
/// use gantry_plugin::telemetry;
///
/// # fn main() -> Result<(), gantry_plugin::telemetry::TelemetryError> {
/// let config = HostConfig::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// drop(first);
/// drop(second);
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &HostConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

fn parse_filter(config: &HostConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_filter)
        .map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn install_subscriber(config: &HostConfig) -> Result<(), TelemetryError> {
    let filter = parse_filter(config)?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn invalid_filters_are_reported() {
        let config = HostConfig {
            log_filter: String::from("gantry=shouting"),
            ..HostConfig::default()
        };
        let err = parse_filter(&config).expect_err("filter should be rejected");
        assert!(matches!(err, TelemetryError::Filter(_)), "{err}");
    }

    #[rstest]
    #[case::json(LogFormat::Json)]
    #[case::compact(LogFormat::Compact)]
    fn initialise_is_idempotent(#[case] log_format: LogFormat) {
        let config = HostConfig {
            log_format,
            ..HostConfig::default()
        };
        initialise(&config).expect("first initialise");
        initialise(&config).expect("second initialise");
    }
}
