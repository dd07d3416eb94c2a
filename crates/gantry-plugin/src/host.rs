//! The host side shared by every loaded plugin.

use std::sync::{Arc, Mutex, PoisonError};

use gantry_resource::Urn;
use tracing::{debug, error, info, warn};

use crate::error::{CloseErrors, PluginError, RpcError};

/// Log target for messages plugins send to the host.
const HOST_TARGET: &str = "gantry_plugin::host";

/// Severity of a message logged on behalf of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Diagnostic detail.
    Debug,
    /// Routine progress.
    Info,
    /// Something unexpected that did not stop the operation.
    Warning,
    /// A failure.
    Error,
}

/// Services the engine offers to the plugins it loads.
pub trait Host: Send + Sync {
    /// Address plugins dial to call back into the engine, if it serves one.
    fn server_addr(&self) -> Option<&str>;

    /// Records a message on behalf of a plugin or resource.
    fn log(&self, severity: LogSeverity, urn: Option<&Urn>, message: &str);

    /// Asks every loaded plugin to abandon its in-flight work.
    ///
    /// # Errors
    ///
    /// Returns every plugin failure, not just the first.
    fn signal_cancellation(&self) -> Result<(), CloseErrors>;

    /// Closes every loaded plugin.
    ///
    /// # Errors
    ///
    /// Returns every plugin failure, not just the first.
    fn close(&self) -> Result<(), CloseErrors>;
}

/// A loaded plugin as the host sees it.
pub trait ManagedPlugin: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Sends the advisory cancellation call.
    ///
    /// # Errors
    ///
    /// Returns the call failure; plugins that do not implement cancellation
    /// are expected to report success.
    fn signal_cancellation(&self) -> Result<(), RpcError>;

    /// Shuts the plugin down.
    ///
    /// # Errors
    ///
    /// Returns the failure to stop the plugin process.
    fn close(&self) -> Result<(), PluginError>;
}

/// A [`Host`] that owns a list of registered plugins.
#[derive(Default)]
pub struct PluginHost {
    server_addr: Option<String>,
    plugins: Mutex<Vec<Arc<dyn ManagedPlugin>>>,
}

impl PluginHost {
    /// Creates a host with no plugins.
    #[must_use]
    pub const fn new(server_addr: Option<String>) -> Self {
        Self {
            server_addr,
            plugins: Mutex::new(Vec::new()),
        }
    }

    /// Registers a loaded plugin so cancellation and close reach it.
    pub fn register(&self, plugin: Arc<dyn ManagedPlugin>) {
        debug!(target: HOST_TARGET, plugin = plugin.name(), "registered plugin");
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(plugin);
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ManagedPlugin>> {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Host for PluginHost {
    fn server_addr(&self) -> Option<&str> {
        self.server_addr.as_deref()
    }

    fn log(&self, severity: LogSeverity, urn: Option<&Urn>, message: &str) {
        let resource = urn.map_or("", Urn::as_str);
        match severity {
            LogSeverity::Debug => debug!(target: HOST_TARGET, urn = resource, "{message}"),
            LogSeverity::Info => info!(target: HOST_TARGET, urn = resource, "{message}"),
            LogSeverity::Warning => warn!(target: HOST_TARGET, urn = resource, "{message}"),
            LogSeverity::Error => error!(target: HOST_TARGET, urn = resource, "{message}"),
        }
    }

    fn signal_cancellation(&self) -> Result<(), CloseErrors> {
        let mut errors = CloseErrors::new();
        for plugin in self.snapshot() {
            if let Err(source) = plugin.signal_cancellation() {
                warn!(
                    target: HOST_TARGET,
                    plugin = plugin.name(),
                    error = %source,
                    "plugin rejected cancellation"
                );
                errors.push(PluginError::Call {
                    name: plugin.name().to_owned(),
                    source,
                });
            }
        }
        errors.into_result()
    }

    fn close(&self) -> Result<(), CloseErrors> {
        let plugins = std::mem::take(
            &mut *self
                .plugins
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut errors = CloseErrors::new();
        for plugin in plugins {
            if let Err(failure) = plugin.close() {
                warn!(
                    target: HOST_TARGET,
                    plugin = plugin.name(),
                    error = %failure,
                    "plugin failed to close"
                );
                errors.push(failure);
            }
        }
        errors.into_result()
    }
}
