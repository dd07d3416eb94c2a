//! JSON-RPC 2.0 message types exchanged with plugin processes.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard code for a request naming a method the peer does not serve.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Standard code for parameters the method could not accept.
pub const INVALID_PARAMS: i64 = -32602;
/// Standard code for a failure inside the handler.
pub const INTERNAL_ERROR: i64 = -32603;
/// Standard code for a payload that was not valid JSON-RPC.
pub const PARSE_ERROR: i64 = -32700;

/// Thread-safe request ID generator.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generates a unique request ID.
///
/// IDs are monotonically increasing and thread-safe.
#[must_use]
pub fn next_request_id() -> i64 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The method to invoke.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Creates a new request with an auto-generated ID.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self::with_id(next_request_id(), method, params)
    }

    /// Creates a new request with a specific ID.
    #[must_use]
    pub fn with_id(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: String::from("2.0"),
            id: Some(id),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    pub jsonrpc: String,
    /// Request identifier this response corresponds to.
    pub id: Option<i64>,
    /// The result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a successful response.
    #[must_use]
    pub fn success(id: Option<i64>, result: Value) -> Self {
        Self {
            jsonrpc: String::from("2.0"),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Option<i64>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: String::from("2.0"),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any message a peer may send over the channel.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// A request or notification initiated by the peer.
    Request(JsonRpcRequest),
    /// A response to one of our requests.
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Classifies a raw payload by the presence of a `method` field.
    ///
    /// # Errors
    ///
    /// Returns the codec error if the payload is not a JSON-RPC message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        if value.get("method").is_some() {
            serde_json::from_value(value).map(Self::Request)
        } else {
            serde_json::from_value(value).map(Self::Response)
        }
    }
}
