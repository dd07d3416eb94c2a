//! State converters that import resources managed by another tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Connection, decode_params, encode_result};
use crate::channel::{PluginChannel, PluginHandler};
use crate::context::PluginContext;
use crate::error::{PluginError, RpcError};

/// Method name for state conversion.
pub const CONVERT_STATE: &str = "converter/convertState";

/// State to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertStateRequest {
    /// Address of the engine's plugin mapper.
    #[serde(default)]
    pub mapper_target: String,
    /// Converter-specific arguments, such as a state file path.
    #[serde(default)]
    pub args: Vec<String>,
}

/// A resource to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceImport {
    /// Resource type token.
    #[serde(rename = "type")]
    pub type_token: String,
    /// Resource name.
    pub name: String,
    /// Provider-assigned ID.
    pub id: String,
    /// Provider version, if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Provider download URL, if not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_download_url: Option<String>,
}

/// Converted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertStateResponse {
    /// Resources to import.
    #[serde(default)]
    pub resources: Vec<ResourceImport>,
    /// Messages about anything that could not be converted.
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

/// Operations a state converter offers.
pub trait Converter: Send + Sync {
    /// Converts foreign state into resources to import.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn convert_state(
        &self,
        request: &ConvertStateRequest,
    ) -> Result<ConvertStateResponse, RpcError>;
}

/// Engine-side client for a converter plugin.
pub struct ConverterClient<C> {
    connection: Connection<C>,
}

impl<C: PluginChannel + 'static> ConverterClient<C> {
    /// Wraps a channel to a converter.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: C, context: PluginContext) -> Self {
        Self {
            connection: Connection::new(name.into(), channel, context),
        }
    }

    /// Shuts the converter down.
    ///
    /// # Errors
    ///
    /// Returns the failure to stop the plugin.
    pub fn close(&self) -> Result<(), PluginError> {
        self.connection.close()
    }
}

impl<C: PluginChannel + 'static> Converter for ConverterClient<C> {
    fn convert_state(
        &self,
        request: &ConvertStateRequest,
    ) -> Result<ConvertStateResponse, RpcError> {
        self.connection.call(CONVERT_STATE, request)
    }
}

/// Plugin-side dispatcher from channel requests to a [`Converter`].
#[derive(Debug)]
pub struct ConverterServer<V> {
    converter: V,
}

impl<V: Converter> ConverterServer<V> {
    /// Serves `converter`.
    #[must_use]
    pub const fn new(converter: V) -> Self {
        Self { converter }
    }
}

impl<V: Converter> PluginHandler for ConverterServer<V> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        if method != CONVERT_STATE {
            return Err(RpcError::unimplemented(method));
        }
        let request: ConvertStateRequest = decode_params(method, params)?;
        encode_result(&self.converter.convert_state(&request)?)
    }
}
