//! Policy analyzers that inspect resources and report violations.

use gantry_config::HostConfig;
use gantry_resource::{PropertyMap, Urn};
use gantry_rpc::{MarshalOptions, WireStruct, marshal_properties, unmarshal_properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Connection, PluginInfo, decode_params, encode_result, server_options};
use crate::channel::{PluginChannel, PluginHandler};
use crate::context::PluginContext;
use crate::error::{PluginError, RpcError};
use crate::host::ManagedPlugin;
use crate::process::{PluginLaunch, PluginProcess};

/// Method names on the analyzer channel.
pub mod methods {
    /// Reports plugin metadata.
    pub const GET_PLUGIN_INFO: &str = "analyzer/getPluginInfo";
    /// Analyzes one resource.
    pub const ANALYZE: &str = "analyzer/analyze";
    /// Advisory cancellation of in-flight work.
    pub const CANCEL: &str = "analyzer/cancel";
}

/// How a policy violation affects the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementLevel {
    /// Reported but does not block.
    #[default]
    Advisory,
    /// Blocks the deployment.
    Mandatory,
    /// Not evaluated.
    Disabled,
}

/// A resource to analyze.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    /// Resource type token.
    pub type_token: String,
    /// Resource inputs.
    pub properties: PropertyMap,
    /// Resource being analyzed.
    pub urn: Urn,
    /// Resource name.
    pub name: String,
}

/// One policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeDiagnostic {
    /// Policy that was violated.
    pub policy_name: String,
    /// Pack the policy belongs to.
    pub policy_pack_name: String,
    /// What the policy checks.
    #[serde(default)]
    pub description: String,
    /// What went wrong.
    pub message: String,
    /// How the violation is enforced.
    #[serde(default)]
    pub enforcement_level: EnforcementLevel,
    /// Offending resource, if the violation is about one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,
}

/// Operations a policy analyzer offers.
pub trait Analyzer: Send + Sync {
    /// Checks one resource against every policy.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn analyze(&self, request: &AnalyzeRequest) -> Result<Vec<AnalyzeDiagnostic>, RpcError>;

    /// Reports plugin metadata.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError>;

    /// Asks the analyzer to abandon in-flight work.
    ///
    /// # Errors
    ///
    /// Returns the call failure; `Unimplemented` is not a failure.
    fn cancel(&self) -> Result<(), RpcError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeParams {
    #[serde(rename = "type")]
    type_token: String,
    #[serde(default)]
    properties: WireStruct,
    urn: Urn,
    #[serde(default)]
    name: String,
}

#[derive(Default, Serialize, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    diagnostics: Vec<AnalyzeDiagnostic>,
}

/// Engine-side client for an analyzer plugin.
pub struct AnalyzerClient<C> {
    connection: Connection<C>,
}

impl AnalyzerClient<PluginProcess> {
    /// Starts an analyzer plugin and wraps it.
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

impl<C: PluginChannel + 'static> AnalyzerClient<C> {
    /// Wraps a channel to an analyzer.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: C, context: PluginContext) -> Self {
        Self {
            connection: Connection::new(name.into(), channel, context),
        }
    }
}

impl<C: PluginChannel + 'static> Analyzer for AnalyzerClient<C> {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<Vec<AnalyzeDiagnostic>, RpcError> {
        // Policies see secrets and unknowns as they are, never engine internals.
        let opts = MarshalOptions::default()
            .with_label(format!("{}.Analyze({})", self.connection.name(), request.urn.as_str()))
            .keep_unknowns(true)
            .keep_secrets(true)
            .skip_internal_keys(true);
        let params = AnalyzeParams {
            type_token: request.type_token.clone(),
            properties: marshal_properties(&request.properties, &opts)?,
            urn: request.urn.clone(),
            name: request.name.clone(),
        };
        let result: AnalyzeResult = self.connection.call(methods::ANALYZE, &params)?;
        Ok(result.diagnostics)
    }

    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError> {
        self.connection.call(methods::GET_PLUGIN_INFO, &Value::Null)
    }

    fn cancel(&self) -> Result<(), RpcError> {
        self.connection.cancel(methods::CANCEL)
    }
}

impl<C: PluginChannel + 'static> ManagedPlugin for AnalyzerClient<C> {
    fn name(&self) -> &str {
        self.connection.name()
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        self.cancel()
    }

    fn close(&self) -> Result<(), PluginError> {
        self.connection.close()
    }
}

/// Plugin-side dispatcher from channel requests to an [`Analyzer`].
#[derive(Debug)]
pub struct AnalyzerServer<A> {
    analyzer: A,
}

impl<A: Analyzer> AnalyzerServer<A> {
    /// Serves `analyzer`.
    #[must_use]
    pub const fn new(analyzer: A) -> Self {
        Self { analyzer }
    }
}

impl<A: Analyzer> PluginHandler for AnalyzerServer<A> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::ANALYZE => {
                let decoded: AnalyzeParams = decode_params(method, params)?;
                let request = AnalyzeRequest {
                    properties: unmarshal_properties(
                        &decoded.properties,
                        &server_options("Analyze.properties").skip_internal_keys(true),
                    )?,
                    type_token: decoded.type_token,
                    urn: decoded.urn,
                    name: decoded.name,
                };
                encode_result(&AnalyzeResult {
                    diagnostics: self.analyzer.analyze(&request)?,
                })
            }
            methods::GET_PLUGIN_INFO => encode_result(&self.analyzer.get_plugin_info()?),
            methods::CANCEL => {
                self.analyzer.cancel()?;
                Ok(Value::Null)
            }
            _ => Err(RpcError::unimplemented(method)),
        }
    }
}
