//! Resource providers: configure, check, and run resource CRUD.
//!
//! [`ProviderClient`] negotiates which rich values the provider accepts
//! during [`configure`](Provider::configure) and degrades secrets and
//! resource references for providers that accept neither. Unknown values are
//! only sent during previews, and outputs of non-preview operations must be
//! fully known.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use gantry_config::HostConfig;
use gantry_resource::{PropertyMap, Urn};
use gantry_rpc::{MarshalOptions, WireStruct, marshal_properties, unmarshal_properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Connection, FACADE_TARGET, PluginInfo, decode_params, encode_result, server_options};
use crate::channel::{PluginChannel, PluginHandler};
use crate::context::PluginContext;
use crate::error::{PluginError, RpcCode, RpcError};
use crate::host::ManagedPlugin;
use crate::process::{PluginLaunch, PluginProcess};

/// Method names on the provider channel.
pub mod methods {
    /// Reports plugin metadata.
    pub const GET_PLUGIN_INFO: &str = "provider/getPluginInfo";
    /// Configures the provider.
    pub const CONFIGURE: &str = "provider/configure";
    /// Validates resource inputs.
    pub const CHECK: &str = "provider/check";
    /// Creates a resource.
    pub const CREATE: &str = "provider/create";
    /// Reads live resource state.
    pub const READ: &str = "provider/read";
    /// Updates a resource.
    pub const UPDATE: &str = "provider/update";
    /// Deletes a resource.
    pub const DELETE: &str = "provider/delete";
    /// Calls a provider function.
    pub const INVOKE: &str = "provider/invoke";
    /// Advisory cancellation of in-flight work.
    pub const CANCEL: &str = "provider/cancel";
}

/// Provider configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigureRequest {
    /// Configuration variables keyed by their fully qualified name.
    pub variables: BTreeMap<String, String>,
    /// Structured configuration.
    pub args: PropertyMap,
}

/// What a configured provider accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureResponse {
    /// The provider accepts secret values.
    #[serde(default)]
    pub accept_secrets: bool,
    /// The provider accepts resource references.
    #[serde(default)]
    pub accept_resources: bool,
    /// The provider can plan creates and updates during previews.
    #[serde(default)]
    pub supports_preview: bool,
}

/// A property that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// The offending property.
    pub property: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Inputs to validate.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    /// Resource being checked.
    pub urn: Urn,
    /// Inputs from the previous deployment.
    pub olds: PropertyMap,
    /// Inputs requested now.
    pub news: PropertyMap,
}

/// Validated inputs and any failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResponse {
    /// Inputs with provider defaults applied.
    pub inputs: PropertyMap,
    /// Validation failures; empty when the inputs are valid.
    pub failures: Vec<CheckFailure>,
}

/// A resource to create.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    /// Resource being created.
    pub urn: Urn,
    /// Checked inputs.
    pub properties: PropertyMap,
    /// Plan only; unknown inputs are allowed.
    pub preview: bool,
}

/// A created resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateResponse {
    /// Provider-assigned ID; empty during previews.
    pub id: String,
    /// Resulting state.
    pub properties: PropertyMap,
}

/// A resource to read back.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// Resource being read.
    pub urn: Urn,
    /// Provider-assigned ID.
    pub id: String,
    /// Last known inputs.
    pub inputs: PropertyMap,
    /// Last known state.
    pub state: PropertyMap,
}

/// Live resource state; an empty ID means the resource no longer exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResponse {
    /// Provider-assigned ID.
    pub id: String,
    /// Inputs reconstructed from the live state.
    pub inputs: PropertyMap,
    /// Live state.
    pub properties: PropertyMap,
}

/// A resource to update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Resource being updated.
    pub urn: Urn,
    /// Provider-assigned ID.
    pub id: String,
    /// Current state.
    pub olds: PropertyMap,
    /// Checked new inputs.
    pub news: PropertyMap,
    /// Plan only; unknown inputs are allowed.
    pub preview: bool,
}

/// An updated resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResponse {
    /// Resulting state.
    pub properties: PropertyMap,
}

/// A resource to delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    /// Resource being deleted.
    pub urn: Urn,
    /// Provider-assigned ID.
    pub id: String,
    /// Current state.
    pub properties: PropertyMap,
}

/// A provider function call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    /// Function token, such as `aws:index/getRegion:getRegion`.
    pub token: String,
    /// Function arguments.
    pub args: PropertyMap,
}

/// A provider function result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResponse {
    /// Returned values.
    pub properties: PropertyMap,
    /// Argument validation failures.
    pub failures: Vec<CheckFailure>,
}

/// Operations a resource provider offers.
pub trait Provider: Send + Sync {
    /// Reports plugin metadata.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError>;

    /// Applies configuration and reports what the provider accepts.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn configure(&self, request: &ConfigureRequest) -> Result<ConfigureResponse, RpcError>;

    /// Validates inputs and applies defaults.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, RpcError>;

    /// Creates a resource, or plans its creation during a preview.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn create(&self, request: &CreateRequest) -> Result<CreateResponse, RpcError>;

    /// Reads a resource's live state.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn read(&self, request: &ReadRequest) -> Result<ReadResponse, RpcError>;

    /// Updates a resource, or plans the update during a preview.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse, RpcError>;

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn delete(&self, request: &DeleteRequest) -> Result<(), RpcError>;

    /// Calls a provider function.
    ///
    /// # Errors
    ///
    /// Returns the call failure.
    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, RpcError>;

    /// Asks the provider to abandon in-flight work.
    ///
    /// # Errors
    ///
    /// Returns the call failure; `Unimplemented` is not a failure.
    fn signal_cancellation(&self) -> Result<(), RpcError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigureParams {
    #[serde(default)]
    variables: BTreeMap<String, String>,
    #[serde(default)]
    args: WireStruct,
    #[serde(default)]
    accept_secrets: bool,
    #[serde(default)]
    accept_resources: bool,
}

#[derive(Serialize, Deserialize)]
struct CheckParams {
    urn: Urn,
    #[serde(default)]
    olds: WireStruct,
    #[serde(default)]
    news: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct CheckResult {
    #[serde(default)]
    inputs: WireStruct,
    #[serde(default)]
    failures: Vec<CheckFailure>,
}

#[derive(Serialize, Deserialize)]
struct CreateParams {
    urn: Urn,
    #[serde(default)]
    properties: WireStruct,
    #[serde(default)]
    preview: bool,
}

#[derive(Serialize, Deserialize)]
struct CreateResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    properties: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct ReadParams {
    urn: Urn,
    id: String,
    #[serde(default)]
    inputs: WireStruct,
    #[serde(default)]
    properties: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct ReadResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    inputs: WireStruct,
    #[serde(default)]
    properties: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct UpdateParams {
    urn: Urn,
    id: String,
    #[serde(default)]
    olds: WireStruct,
    #[serde(default)]
    news: WireStruct,
    #[serde(default)]
    preview: bool,
}

#[derive(Serialize, Deserialize)]
struct UpdateResult {
    #[serde(default)]
    properties: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct DeleteParams {
    urn: Urn,
    id: String,
    #[serde(default)]
    properties: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct InvokeParams {
    token: String,
    #[serde(default)]
    args: WireStruct,
}

#[derive(Serialize, Deserialize)]
struct InvokeResult {
    #[serde(default)]
    properties: WireStruct,
    #[serde(default)]
    failures: Vec<CheckFailure>,
}

/// Options for decoding anything a provider returns.
fn returned(label: String) -> MarshalOptions {
    MarshalOptions::default()
        .with_label(label)
        .keep_unknowns(true)
        .keep_secrets(true)
        .keep_resources(true)
}

/// Options for decoding the state a create or update produced.
fn produced(label: String, preview: bool) -> MarshalOptions {
    returned(label)
        .keep_unknowns(preview)
        .reject_unknowns(!preview)
}

/// Engine-side client for a provider plugin.
pub struct ProviderClient<C> {
    connection: Connection<C>,
    protocol: Mutex<ConfigureResponse>,
}

impl ProviderClient<PluginProcess> {
    /// Starts a provider plugin and wraps it.
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

impl<C: PluginChannel + 'static> ProviderClient<C> {
    /// Wraps a channel to a provider.
    ///
    /// Until [`configure`](Provider::configure) succeeds the provider is
    /// assumed to accept neither secrets nor resource references.
    #[must_use]
    pub fn new(name: impl Into<String>, channel: C, context: PluginContext) -> Self {
        Self {
            connection: Connection::new(name.into(), channel, context),
            protocol: Mutex::new(ConfigureResponse::default()),
        }
    }

    /// Returns what the provider accepted during configuration.
    #[must_use]
    pub fn protocol(&self) -> ConfigureResponse {
        *self.protocol.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Options for encoding values sent to the provider.
    fn sent(&self, label: String) -> MarshalOptions {
        let protocol = self.protocol();
        MarshalOptions::default()
            .with_label(label)
            .keep_secrets(protocol.accept_secrets)
            .keep_resources(protocol.accept_resources)
    }

    fn label(&self, operation: &str, urn: &Urn) -> String {
        format!("{}.{operation}({})", self.connection.name(), urn.as_str())
    }
}

impl<C: PluginChannel + 'static> Provider for ProviderClient<C> {
    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError> {
        self.connection.call(methods::GET_PLUGIN_INFO, &Value::Null)
    }

    fn configure(&self, request: &ConfigureRequest) -> Result<ConfigureResponse, RpcError> {
        let label = format!("{}.Configure()", self.connection.name());
        let opts = MarshalOptions::default()
            .with_label(format!("{label}.args"))
            .keep_unknowns(true)
            .keep_secrets(true)
            .keep_resources(true);
        let params = ConfigureParams {
            variables: request.variables.clone(),
            args: marshal_properties(&request.args, &opts)?,
            accept_secrets: true,
            accept_resources: true,
        };
        let response: ConfigureResponse = self.connection.call(methods::CONFIGURE, &params)?;
        debug!(
            target: FACADE_TARGET,
            plugin = %self.connection.name(),
            accept_secrets = response.accept_secrets,
            accept_resources = response.accept_resources,
            supports_preview = response.supports_preview,
            "provider configured"
        );
        *self.protocol.lock().unwrap_or_else(PoisonError::into_inner) = response;
        Ok(response)
    }

    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, RpcError> {
        let label = self.label("Check", &request.urn);
        let olds = self.sent(format!("{label}.olds")).keep_unknowns(true);
        let news = self.sent(format!("{label}.news")).keep_unknowns(true);
        let params = CheckParams {
            urn: request.urn.clone(),
            olds: marshal_properties(&request.olds, &olds)?,
            news: marshal_properties(&request.news, &news)?,
        };
        let result: CheckResult = self.connection.call(methods::CHECK, &params)?;
        Ok(CheckResponse {
            inputs: unmarshal_properties(&result.inputs, &returned(format!("{label}.inputs")))?,
            failures: result.failures,
        })
    }

    fn create(&self, request: &CreateRequest) -> Result<CreateResponse, RpcError> {
        if request.preview && !self.protocol().supports_preview {
            return Ok(CreateResponse {
                id: String::new(),
                properties: request.properties.clone(),
            });
        }
        let label = self.label("Create", &request.urn);
        let opts = self
            .sent(format!("{label}.properties"))
            .keep_unknowns(request.preview);
        let params = CreateParams {
            urn: request.urn.clone(),
            properties: marshal_properties(&request.properties, &opts)?,
            preview: request.preview,
        };
        let result: CreateResult = self.connection.call(methods::CREATE, &params)?;
        if result.id.is_empty() && !request.preview {
            return Err(RpcError::new(
                RpcCode::Internal,
                format!(
                    "plugin returned empty resource ID from create of '{}'",
                    request.urn.as_str()
                ),
            ));
        }
        let properties = unmarshal_properties(
            &result.properties,
            &produced(format!("{label}.outputs"), request.preview),
        )?;
        Ok(CreateResponse {
            id: result.id,
            properties,
        })
    }

    fn read(&self, request: &ReadRequest) -> Result<ReadResponse, RpcError> {
        let label = self.label("Read", &request.urn);
        let params = ReadParams {
            urn: request.urn.clone(),
            id: request.id.clone(),
            inputs: marshal_properties(&request.inputs, &self.sent(format!("{label}.inputs")))?,
            properties: marshal_properties(&request.state, &self.sent(format!("{label}.state")))?,
        };
        let result: ReadResult = self.connection.call(methods::READ, &params)?;
        Ok(ReadResponse {
            inputs: unmarshal_properties(
                &result.inputs,
                &produced(format!("{label}.inputs"), false),
            )?,
            properties: unmarshal_properties(
                &result.properties,
                &produced(format!("{label}.outputs"), false),
            )?,
            id: result.id,
        })
    }

    fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse, RpcError> {
        if request.preview && !self.protocol().supports_preview {
            return Ok(UpdateResponse {
                properties: request.news.clone(),
            });
        }
        let label = self.label("Update", &request.urn);
        let olds = self
            .sent(format!("{label}.olds"))
            .elide_asset_contents(true);
        let news = self
            .sent(format!("{label}.news"))
            .keep_unknowns(request.preview);
        let params = UpdateParams {
            urn: request.urn.clone(),
            id: request.id.clone(),
            olds: marshal_properties(&request.olds, &olds)?,
            news: marshal_properties(&request.news, &news)?,
            preview: request.preview,
        };
        let result: UpdateResult = self.connection.call(methods::UPDATE, &params)?;
        Ok(UpdateResponse {
            properties: unmarshal_properties(
                &result.properties,
                &produced(format!("{label}.outputs"), request.preview),
            )?,
        })
    }

    fn delete(&self, request: &DeleteRequest) -> Result<(), RpcError> {
        let label = self.label("Delete", &request.urn);
        let opts = self
            .sent(format!("{label}.properties"))
            .elide_asset_contents(true);
        let params = DeleteParams {
            urn: request.urn.clone(),
            id: request.id.clone(),
            properties: marshal_properties(&request.properties, &opts)?,
        };
        self.connection.call(methods::DELETE, &params)
    }

    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, RpcError> {
        let label = format!("{}.Invoke({})", self.connection.name(), request.token);
        let args = self.sent(format!("{label}.args")).keep_unknowns(true);
        let params = InvokeParams {
            token: request.token.clone(),
            args: marshal_properties(&request.args, &args)?,
        };
        let result: InvokeResult = self.connection.call(methods::INVOKE, &params)?;
        Ok(InvokeResponse {
            properties: unmarshal_properties(
                &result.properties,
                &returned(format!("{label}.returns")),
            )?,
            failures: result.failures,
        })
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        self.connection.cancel(methods::CANCEL)
    }
}

impl<C: PluginChannel + 'static> ManagedPlugin for ProviderClient<C> {
    fn name(&self) -> &str {
        self.connection.name()
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        Provider::signal_cancellation(self)
    }

    fn close(&self) -> Result<(), PluginError> {
        self.connection.close()
    }
}

impl<C> std::fmt::Debug for ProviderClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("protocol", &self.protocol.lock().unwrap_or_else(PoisonError::into_inner))
            .finish_non_exhaustive()
    }
}

/// Plugin-side dispatcher from channel requests to a [`Provider`].
#[derive(Debug)]
pub struct ProviderServer<P> {
    provider: P,
}

impl<P: Provider> ProviderServer<P> {
    /// Serves `provider`.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    fn configure(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: ConfigureParams = decode_params(methods::CONFIGURE, params)?;
        let request = ConfigureRequest {
            variables: decoded.variables,
            args: unmarshal_properties(&decoded.args, &server_options("Configure.args"))?,
        };
        encode_result(&self.provider.configure(&request)?)
    }

    fn check(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: CheckParams = decode_params(methods::CHECK, params)?;
        let request = CheckRequest {
            urn: decoded.urn,
            olds: unmarshal_properties(&decoded.olds, &server_options("Check.olds"))?,
            news: unmarshal_properties(&decoded.news, &server_options("Check.news"))?,
        };
        let response = self.provider.check(&request)?;
        encode_result(&CheckResult {
            inputs: marshal_properties(&response.inputs, &server_options("Check.inputs"))?,
            failures: response.failures,
        })
    }

    fn create(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: CreateParams = decode_params(methods::CREATE, params)?;
        let request = CreateRequest {
            urn: decoded.urn,
            properties: unmarshal_properties(
                &decoded.properties,
                &server_options("Create.properties"),
            )?,
            preview: decoded.preview,
        };
        let response = self.provider.create(&request)?;
        encode_result(&CreateResult {
            id: response.id,
            properties: marshal_properties(
                &response.properties,
                &server_options("Create.outputs"),
            )?,
        })
    }

    fn read(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: ReadParams = decode_params(methods::READ, params)?;
        let request = ReadRequest {
            urn: decoded.urn,
            id: decoded.id,
            inputs: unmarshal_properties(&decoded.inputs, &server_options("Read.inputs"))?,
            state: unmarshal_properties(&decoded.properties, &server_options("Read.state"))?,
        };
        let response = self.provider.read(&request)?;
        encode_result(&ReadResult {
            id: response.id,
            inputs: marshal_properties(&response.inputs, &server_options("Read.inputs"))?,
            properties: marshal_properties(&response.properties, &server_options("Read.outputs"))?,
        })
    }

    fn update(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: UpdateParams = decode_params(methods::UPDATE, params)?;
        let request = UpdateRequest {
            urn: decoded.urn,
            id: decoded.id,
            olds: unmarshal_properties(&decoded.olds, &server_options("Update.olds"))?,
            news: unmarshal_properties(&decoded.news, &server_options("Update.news"))?,
            preview: decoded.preview,
        };
        let response = self.provider.update(&request)?;
        encode_result(&UpdateResult {
            properties: marshal_properties(
                &response.properties,
                &server_options("Update.outputs"),
            )?,
        })
    }

    fn delete(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: DeleteParams = decode_params(methods::DELETE, params)?;
        let request = DeleteRequest {
            urn: decoded.urn,
            id: decoded.id,
            properties: unmarshal_properties(
                &decoded.properties,
                &server_options("Delete.properties"),
            )?,
        };
        self.provider.delete(&request)?;
        Ok(Value::Null)
    }

    fn invoke(&self, params: Value) -> Result<Value, RpcError> {
        let decoded: InvokeParams = decode_params(methods::INVOKE, params)?;
        let request = InvokeRequest {
            token: decoded.token,
            args: unmarshal_properties(&decoded.args, &server_options("Invoke.args"))?,
        };
        let response = self.provider.invoke(&request)?;
        encode_result(&InvokeResult {
            properties: marshal_properties(
                &response.properties,
                &server_options("Invoke.returns"),
            )?,
            failures: response.failures,
        })
    }
}

impl<P: Provider> PluginHandler for ProviderServer<P> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::GET_PLUGIN_INFO => encode_result(&self.provider.get_plugin_info()?),
            methods::CONFIGURE => self.configure(params),
            methods::CHECK => self.check(params),
            methods::CREATE => self.create(params),
            methods::READ => self.read(params),
            methods::UPDATE => self.update(params),
            methods::DELETE => self.delete(params),
            methods::INVOKE => self.invoke(params),
            methods::CANCEL => {
                self.provider.signal_cancellation()?;
                Ok(Value::Null)
            }
            _ => Err(RpcError::unimplemented(method)),
        }
    }
}

#[cfg(test)]
mod tests;
