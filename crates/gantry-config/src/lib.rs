//! Configuration for the gantry plugin host.
//!
//! [`HostConfig`] gathers the settings the host needs outside of any single
//! plugin call: how to log, how long calls may run, how long plugins get to
//! shut down, and which environment variables launched plugins receive.
//! Values start from documented defaults and can be overridden from the
//! process environment or deserialised from an embedder's own files.

mod defaults;
mod host;
mod logging;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SHUTDOWN_GRACE, default_log_filter_string, default_log_format,
    default_shutdown_grace,
};
pub use host::{
    CALL_TIMEOUT_ENV, ConfigError, HostConfig, LOG_FILTER_ENV, LOG_FORMAT_ENV, SHUTDOWN_GRACE_ENV,
};
pub use logging::LogFormat;
