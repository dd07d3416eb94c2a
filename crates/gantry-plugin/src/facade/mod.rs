//! Typed clients and servers for each kind of plugin.
//!
//! Each facade pairs a trait describing the plugin's operations with a
//! client that implements it over a [`PluginChannel`] and a server that
//! dispatches channel requests to any implementation. Clients encode
//! property payloads with the options the endpoint can accept; servers
//! decode with every capability kept and leave policy to the client.

pub mod analyzer;
pub mod converter;
pub mod language;
pub mod provider;
pub mod secrets;

use std::sync::Arc;

use gantry_rpc::MarshalOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::channel::PluginChannel;
use crate::context::PluginContext;
use crate::error::{PluginError, RpcCode, RpcError};

/// Log target for facade calls.
const FACADE_TARGET: &str = "gantry_plugin::facade";

/// What a plugin reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin version, if it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A named channel whose calls run inside request scopes.
pub(crate) struct Connection<C> {
    name: String,
    channel: Arc<C>,
    context: PluginContext,
}

impl<C: PluginChannel + 'static> Connection<C> {
    pub(crate) fn new(name: String, channel: C, context: PluginContext) -> Self {
        Self {
            name,
            channel: Arc::new(channel),
            context,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Calls `method` within a fresh request scope.
    pub(crate) fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = serde_json::to_value(params)?;
        let channel = Arc::clone(&self.channel);
        let scope = self.context.request();
        trace!(target: FACADE_TARGET, plugin = %self.name, method, "calling plugin");
        let result = scope.run(move || channel.call(method, value))?;
        serde_json::from_value(result).map_err(|error| {
            RpcError::new(
                RpcCode::Internal,
                format!("malformed {method} response from '{}': {error}", self.name),
            )
        })
    }

    /// Sends an advisory cancellation, treating `Unimplemented` as success.
    pub(crate) fn cancel(&self, method: &'static str) -> Result<(), RpcError> {
        match self.call::<_, Value>(method, &Value::Null) {
            Ok(_) => Ok(()),
            Err(error) if error.is_unimplemented() => {
                trace!(
                    target: FACADE_TARGET,
                    plugin = %self.name,
                    "plugin does not implement cancellation"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    pub(crate) fn close(&self) -> Result<(), PluginError> {
        self.channel.close()
    }
}

/// Options servers decode requests and encode results with.
fn server_options(label: &str) -> MarshalOptions {
    MarshalOptions::default()
        .with_label(label)
        .keep_unknowns(true)
        .keep_secrets(true)
        .keep_resources(true)
}

/// Decodes request parameters on the server side.
fn decode_params<P: DeserializeOwned>(method: &str, params: Value) -> Result<P, RpcError> {
    serde_json::from_value(params).map_err(|error| {
        RpcError::new(
            RpcCode::InvalidArgument,
            format!("malformed {method} request: {error}"),
        )
    })
}

/// Encodes a result on the server side.
fn encode_result<R: Serialize>(result: &R) -> Result<Value, RpcError> {
    serde_json::to_value(result)
        .map_err(|error| RpcError::new(RpcCode::Internal, error.to_string()))
}
