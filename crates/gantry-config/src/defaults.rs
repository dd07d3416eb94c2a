use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default time a plugin is given to exit after its channel closes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default shutdown grace period.
#[must_use]
pub const fn default_shutdown_grace() -> Duration {
    DEFAULT_SHUTDOWN_GRACE
}
