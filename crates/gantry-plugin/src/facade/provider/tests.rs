//! Unit tests for the provider client and server.

use gantry_config::HostConfig;
use gantry_resource::{Asset, PropertyValue, sig};
use gantry_rpc::sentinel::UNKNOWN_STRING;
use mockall::mock;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::channel::LoopbackChannel;

mock! {
    Channel {}
    impl PluginChannel for Channel {
        fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
        fn close(&self) -> Result<(), PluginError>;
    }
}

/// Echoes inputs back as state and accepts every rich value.
struct EchoProvider;

impl Provider for EchoProvider {
    fn get_plugin_info(&self) -> Result<PluginInfo, RpcError> {
        Ok(PluginInfo {
            version: Some(String::from("1.2.3")),
        })
    }

    fn configure(&self, _request: &ConfigureRequest) -> Result<ConfigureResponse, RpcError> {
        Ok(ConfigureResponse {
            accept_secrets: true,
            accept_resources: true,
            supports_preview: true,
        })
    }

    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, RpcError> {
        let failures = if request.news.contains_key("bogus") {
            vec![CheckFailure {
                property: String::from("bogus"),
                reason: String::from("not a known property"),
            }]
        } else {
            Vec::new()
        };
        Ok(CheckResponse {
            inputs: request.news.clone(),
            failures,
        })
    }

    fn create(&self, request: &CreateRequest) -> Result<CreateResponse, RpcError> {
        let id = if request.preview {
            String::new()
        } else {
            String::from("id-1")
        };
        Ok(CreateResponse {
            id,
            properties: request.properties.clone(),
        })
    }

    fn read(&self, request: &ReadRequest) -> Result<ReadResponse, RpcError> {
        Ok(ReadResponse {
            id: request.id.clone(),
            inputs: request.inputs.clone(),
            properties: request.state.clone(),
        })
    }

    fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse, RpcError> {
        Ok(UpdateResponse {
            properties: request.news.clone(),
        })
    }

    fn delete(&self, _request: &DeleteRequest) -> Result<(), RpcError> {
        Ok(())
    }

    fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, RpcError> {
        Ok(InvokeResponse {
            properties: request.args.clone(),
            failures: Vec::new(),
        })
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        Err(RpcError::unimplemented(methods::CANCEL))
    }
}

#[fixture]
fn context() -> PluginContext {
    PluginContext::new(&HostConfig::default())
}

fn urn() -> Urn {
    Urn::new("urn:pulumi:dev::proj::aws:s3/bucket:Bucket::logs")
}

fn loopback(
    context: PluginContext,
) -> ProviderClient<LoopbackChannel<ProviderServer<EchoProvider>>> {
    ProviderClient::new(
        "aws",
        LoopbackChannel::new(ProviderServer::new(EchoProvider)),
        context,
    )
}

fn secret_inputs() -> PropertyMap {
    PropertyMap::new()
        .with("bucket", "logs")
        .with("password", PropertyValue::make_secret("hunter2".into()))
}

#[rstest]
fn configured_provider_round_trips_secrets(context: PluginContext) {
    let client = loopback(context);
    let protocol = client.configure(&ConfigureRequest::default()).expect("configure");
    assert!(protocol.accept_secrets);
    assert_eq!(client.protocol(), protocol);

    let response = client
        .create(&CreateRequest {
            urn: urn(),
            properties: secret_inputs(),
            preview: false,
        })
        .expect("create");

    assert_eq!(response.id, "id-1");
    assert_eq!(response.properties, secret_inputs());
}

#[rstest]
fn unconfigured_provider_receives_plain_secrets(context: PluginContext) {
    let mut channel = MockChannel::new();
    channel
        .expect_call()
        .once()
        .return_once(|method, params| {
            assert_eq!(method, methods::CREATE);
            assert_eq!(params["properties"]["password"], json!("hunter2"));
            Ok(json!({"id": "id-7", "properties": {"bucket": "logs"}}))
        });
    let client = ProviderClient::new("aws", channel, context);

    let response = client
        .create(&CreateRequest {
            urn: urn(),
            properties: secret_inputs(),
            preview: false,
        })
        .expect("create");
    assert_eq!(response.id, "id-7");
    assert_eq!(response.properties, PropertyMap::new().with("bucket", "logs"));
}

#[rstest]
fn preview_without_provider_support_skips_the_call(context: PluginContext) {
    let channel = MockChannel::new();
    let client = ProviderClient::new("aws", channel, context);
    let inputs = PropertyMap::new().with("size", PropertyValue::make_computed(0.0.into()));

    let response = client
        .create(&CreateRequest {
            urn: urn(),
            properties: inputs.clone(),
            preview: true,
        })
        .expect("preview create");
    assert!(response.id.is_empty());
    assert_eq!(response.properties, inputs);
}

#[rstest]
fn unknown_outputs_outside_preview_are_rejected(context: PluginContext) {
    let mut channel = MockChannel::new();
    channel.expect_call().once().return_once(|_, _| {
        Ok(json!({
            "id": "id-1",
            "properties": {"arn": UNKNOWN_STRING}
        }))
    });
    let client = ProviderClient::new("aws", channel, context);

    let err = client
        .create(&CreateRequest {
            urn: urn(),
            properties: PropertyMap::new(),
            preview: false,
        })
        .expect_err("unknown output");
    assert_eq!(err.code, RpcCode::InvalidArgument);
}

#[rstest]
fn empty_id_from_create_is_an_error(context: PluginContext) {
    let mut channel = MockChannel::new();
    channel
        .expect_call()
        .once()
        .return_once(|_, _| Ok(json!({"id": "", "properties": {}})));
    let client = ProviderClient::new("aws", channel, context);

    let err = client
        .create(&CreateRequest {
            urn: urn(),
            properties: PropertyMap::new(),
            preview: false,
        })
        .expect_err("empty id");
    assert_eq!(err.code, RpcCode::Internal);
    assert!(err.message.contains("aws:s3/bucket:Bucket::logs"), "{err}");
}

#[rstest]
fn delete_sends_only_asset_hashes(context: PluginContext) {
    let mut channel = MockChannel::new();
    channel
        .expect_call()
        .once()
        .return_once(|method, params| {
            let asset = &params["properties"]["index"];
            assert_eq!(method, methods::DELETE);
            assert_eq!(asset[sig::SIG_KEY], json!(sig::ASSET_SIG));
            assert_eq!(asset[sig::HASH_FIELD], json!("abc123"));
            assert!(asset.get(sig::TEXT_FIELD).is_none());
            Ok(Value::Null)
        });
    let client = ProviderClient::new("aws", channel, context);

    client
        .delete(&DeleteRequest {
            urn: urn(),
            id: String::from("id-1"),
            properties: PropertyMap::new()
                .with("index", Asset::text("<html/>").with_hash("abc123")),
        })
        .expect("delete");
}

#[rstest]
#[case::unimplemented(RpcCode::Unimplemented, true)]
#[case::unavailable(RpcCode::Unavailable, false)]
fn cancellation_tolerates_unimplemented(
    context: PluginContext,
    #[case] code: RpcCode,
    #[case] succeeds: bool,
) {
    let mut channel = MockChannel::new();
    channel
        .expect_call()
        .once()
        .return_once(move |method, _| {
            assert_eq!(method, methods::CANCEL);
            Err(RpcError::new(code, "no"))
        });
    let client = ProviderClient::new("aws", channel, context);

    assert_eq!(Provider::signal_cancellation(&client).is_ok(), succeeds);
}

#[rstest]
fn check_reports_failures_and_defaults(context: PluginContext) {
    let client = loopback(context);
    let response = client
        .check(&CheckRequest {
            urn: urn(),
            olds: PropertyMap::new(),
            news: PropertyMap::new().with("bogus", true),
        })
        .expect("check");

    assert_eq!(response.inputs.get("bogus"), Some(&PropertyValue::Bool(true)));
    assert_eq!(
        response.failures,
        [CheckFailure {
            property: String::from("bogus"),
            reason: String::from("not a known property"),
        }]
    );
}

#[rstest]
fn read_and_invoke_round_trip(context: PluginContext) {
    let client = loopback(context);
    client.configure(&ConfigureRequest::default()).expect("configure");

    let read = client
        .read(&ReadRequest {
            urn: urn(),
            id: String::from("id-1"),
            inputs: PropertyMap::new().with("bucket", "logs"),
            state: secret_inputs(),
        })
        .expect("read");
    assert_eq!(read.id, "id-1");
    assert_eq!(read.properties, secret_inputs());

    let invoke = client
        .invoke(&InvokeRequest {
            token: String::from("aws:index/getRegion:getRegion"),
            args: PropertyMap::new().with("name", "eu-west-2"),
        })
        .expect("invoke");
    assert_eq!(invoke.properties, PropertyMap::new().with("name", "eu-west-2"));
    assert!(invoke.failures.is_empty());
}

#[rstest]
fn plugin_info_and_unknown_methods(context: PluginContext) {
    let client = loopback(context);
    let info = client.get_plugin_info().expect("info");
    assert_eq!(info.version.as_deref(), Some("1.2.3"));

    let server = ProviderServer::new(EchoProvider);
    let err = server
        .handle("provider/construct", Value::Null)
        .expect_err("unknown method");
    assert!(err.is_unimplemented());
}

#[rstest]
fn malformed_requests_are_invalid_arguments() {
    let server = ProviderServer::new(EchoProvider);
    let err = server
        .handle(methods::CREATE, json!({"properties": {}}))
        .expect_err("missing urn");
    assert_eq!(err.code, RpcCode::InvalidArgument);
}

#[rstest]
fn closed_context_cancels_calls(context: PluginContext) {
    let client = loopback(context.clone());
    context.close().expect("close");

    let err = client.get_plugin_info().expect_err("closed");
    assert_eq!(err.code, RpcCode::Cancelled);
}
