//! Language runtimes that host user programs.

use std::collections::BTreeMap;

use gantry_config::HostConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Connection, PluginInfo, decode_params, encode_result};
use crate::channel::{PluginChannel, PluginHandler};
use crate::context::PluginContext;
use crate::error::{PluginError, RpcError};
use crate::host::ManagedPlugin;
use crate::process::{PluginLaunch, PluginProcess};

/// Method names on the language runtime channel.
pub mod methods {
    /// Reports plugin metadata.
    pub const GET_PLUGIN_INFO: &str = "language/getPluginInfo";
    /// Lists the plugins a program needs.
    pub const GET_REQUIRED_PLUGINS: &str = "language/getRequiredPlugins";
    /// Runs a program.
    pub const RUN: &str = "language/run";
}

/// Where a program lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    /// Directory holding the project file.
    pub root_directory: String,
    /// Directory holding the program.
    pub program_directory: String,
    /// Entry point relative to the program directory.
    #[serde(default)]
    pub entry_point: String,
}

/// A plugin a program depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    /// Plugin name, such as `aws`.
    pub name: String,
    /// Plugin kind, such as `resource`.
    pub kind: String,
    /// Required version, if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Download server, if not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

/// A program to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Project name.
    pub project: String,
    /// Stack name.
    pub stack: String,
    /// Program location.
    pub info: ProgramInfo,
    /// Engine address the program registers resources with.
    #[serde(default)]
    pub monitor_address: String,
    /// Extra program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Configuration variables.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Configuration keys whose values are secret.
    #[serde(default)]
    pub config_secret_keys: Vec<String>,
    /// Plan only.
    #[serde(default)]
    pub dry_run: bool,
    /// Maximum concurrent resource operations.
    #[serde(default)]
    pub parallel: u32,
}

/// How a program run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    /// Program failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure was already reported to the user.
    #[serde(default)]
    pub bail: bool,
}

/// Operations a language runtime offers.
pub trait LanguageRuntime: Send + Sync {
    /// Lists the plugins the program needs.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn get_required_plugins(&self, info: &ProgramInfo) -> Result<Vec<PluginDependency>, RpcError>;

    /// Runs the program to completion.
    ///
    /// # Errors
    ///
    /// Returns the call failure. A failing program is reported in the
    /// response instead.
    fn run(&self, request: &RunRequest) -> Result<RunResponse, RpcError>;

    /// Reports plugin metadata.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError>;
}

#[derive(Default, Serialize, Deserialize)]
struct RequiredPlugins {
    #[serde(default)]
    plugins: Vec<PluginDependency>,
}

/// Engine-side client for a language runtime plugin.
pub struct LanguageRuntimeClient<C> {
    connection: Connection<C>,
}

impl LanguageRuntimeClient<PluginProcess> {
    /// Starts a language runtime plugin and wraps it.
    ///
    /// # Errors
    ///
    /// Returns the launch failure.
    pub fn launch(
        launch: &PluginLaunch,
        config: &HostConfig,
        context: PluginContext,
    ) -> Result<Self, PluginError> {
        let process = PluginProcess::launch(launch, config)?;
        Ok(Self::new(launch.name(), process, context))
    }
}

impl<C: PluginChannel + 'static> LanguageRuntimeClient<C> {
    /// Wraps a channel to a language runtime.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: C, context: PluginContext) -> Self {
        Self {
            connection: Connection::new(name.into(), channel, context),
        }
    }
}

impl<C: PluginChannel + 'static> LanguageRuntime for LanguageRuntimeClient<C> {
    fn get_required_plugins(&self, info: &ProgramInfo) -> Result<Vec<PluginDependency>, RpcError> {
        let result: RequiredPlugins = self.connection.call(methods::GET_REQUIRED_PLUGINS, info)?;
        Ok(result.plugins)
    }

    fn run(&self, request: &RunRequest) -> Result<RunResponse, RpcError> {
        self.connection.call(methods::RUN, request)
    }

    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError> {
        self.connection.call(methods::GET_PLUGIN_INFO, &Value::Null)
    }
}

impl<C: PluginChannel + 'static> ManagedPlugin for LanguageRuntimeClient<C> {
    fn name(&self) -> &str {
        self.connection.name()
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        // Runtimes have no cancellation call; the program sees the engine go away.
        Ok(())
    }

    fn close(&self) -> Result<(), PluginError> {
        self.connection.close()
    }
}

/// Plugin-side dispatcher from channel requests to a [`LanguageRuntime`].
#[derive(Debug)]
pub struct LanguageRuntimeServer<L> {
    runtime: L,
}

impl<L: LanguageRuntime> LanguageRuntimeServer<L> {
    /// Serves `runtime`.
    #[must_use]
    pub const fn new(runtime: L) -> Self {
        Self { runtime }
    }
}

impl<L: LanguageRuntime> PluginHandler for LanguageRuntimeServer<L> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::GET_REQUIRED_PLUGINS => {
                let info: ProgramInfo = decode_params(method, params)?;
                encode_result(&RequiredPlugins {
                    plugins: self.runtime.get_required_plugins(&info)?,
                })
            }
            methods::RUN => {
                let request: RunRequest = decode_params(method, params)?;
                encode_result(&self.runtime.run(&request)?)
            }
            methods::GET_PLUGIN_INFO => encode_result(&self.runtime.get_plugin_info()?),
            _ => Err(RpcError::unimplemented(method)),
        }
    }
}
