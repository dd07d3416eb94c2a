//! The request/response seam between facades and plugins.
//!
//! Facade clients talk to a [`PluginChannel`]; facade servers implement
//! [`PluginHandler`]. A spawned [`PluginProcess`](crate::PluginProcess) is
//! one channel, [`LoopbackChannel`] runs a handler in-process, and [`serve`]
//! is the plugin-side loop answering framed requests on stdio.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PluginError, RpcError, TransportError};
use crate::jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcResponse, PARSE_ERROR};
use crate::transport::FramedTransport;

/// Log target for channel operations.
const CHANNEL_TARGET: &str = "gantry_plugin::channel";

/// A connection able to carry one request and its response at a time.
pub trait PluginChannel: Send + Sync {
    /// Sends `method` with `params` and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns the peer's error, or `Unavailable` if the channel is closed
    /// or broken.
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Closes the channel. Repeat calls succeed without effect.
    ///
    /// # Errors
    ///
    /// Returns the failure to stop the underlying process, if any.
    fn close(&self) -> Result<(), PluginError>;
}

impl<C: PluginChannel + ?Sized> PluginChannel for Arc<C> {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).call(method, params)
    }

    fn close(&self) -> Result<(), PluginError> {
        (**self).close()
    }
}

/// The plugin side of a channel: dispatches one request by method name.
pub trait PluginHandler: Send + Sync {
    /// Handles `method` with `params`.
    ///
    /// # Errors
    ///
    /// Returns `Unimplemented` for methods this handler does not serve, or
    /// the handler's own failure.
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

impl<H: PluginHandler + ?Sized> PluginHandler for Arc<H> {
    fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        (**self).handle(method, params)
    }
}

/// Runs a handler in-process behind the channel interface.
///
/// Parameters and results pass through JSON text so the handler sees exactly
/// what a remote plugin would.
pub struct LoopbackChannel<H> {
    handler: H,
    closed: AtomicBool,
}

impl<H: PluginHandler> LoopbackChannel<H> {
    /// Wraps `handler`.
    #[must_use]
    pub const fn new(handler: H) -> Self {
        Self {
            handler,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: PluginHandler> PluginChannel for LoopbackChannel<H> {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::channel_closed());
        }
        let request: Value = serde_json::from_slice(&serde_json::to_vec(&params)?)?;
        let response = self.handler.handle(method, request)?;
        Ok(serde_json::from_slice(&serde_json::to_vec(&response)?)?)
    }

    fn close(&self) -> Result<(), PluginError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers framed JSON-RPC requests until the peer closes its end.
///
/// Requests without an ID are notifications and get no response.
///
/// # Errors
///
/// Returns the transport failure that ended the loop early.
pub fn serve<H, R, W>(handler: &H, reader: R, writer: W) -> Result<(), TransportError>
where
    H: PluginHandler + ?Sized,
    R: Read,
    W: Write,
{
    let mut transport = FramedTransport::new(reader, writer);
    while let Some(bytes) = transport.receive_optional()? {
        let response = match JsonRpcMessage::from_bytes(&bytes) {
            Ok(JsonRpcMessage::Request(request)) => {
                debug!(
                    target: CHANNEL_TARGET,
                    method = %request.method,
                    id = ?request.id,
                    "serving request"
                );
                let outcome = handler.handle(&request.method, request.params);
                let Some(id) = request.id else {
                    continue;
                };
                match outcome {
                    Ok(result) => JsonRpcResponse::success(Some(id), result),
                    Err(error) => JsonRpcResponse::failure(Some(id), error.to_jsonrpc()),
                }
            }
            Ok(JsonRpcMessage::Response(response)) => {
                warn!(target: CHANNEL_TARGET, id = ?response.id, "ignoring unsolicited response");
                continue;
            }
            Err(error) => JsonRpcResponse::failure(
                None,
                JsonRpcError {
                    code: PARSE_ERROR,
                    message: error.to_string(),
                    data: None,
                },
            ),
        };
        let payload = serde_json::to_vec(&response)
            .map_err(|error| TransportError::Io(std::io::Error::other(error)))?;
        transport.send(&payload)?;
    }
    debug!(target: CHANNEL_TARGET, "peer closed the channel");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::error::RpcCode;
    use crate::jsonrpc::{JsonRpcRequest, METHOD_NOT_FOUND};

    struct Echo;

    impl PluginHandler for Echo {
        fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
            match method {
                "echo" => Ok(params),
                _ => Err(RpcError::unimplemented(method)),
            }
        }
    }

    fn frame(message: &impl serde::Serialize) -> Vec<u8> {
        let payload = serde_json::to_vec(message).expect("serialise");
        let mut framed = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        framed.extend(payload);
        framed
    }

    fn responses(output: Vec<u8>) -> Vec<JsonRpcResponse> {
        let mut transport = FramedTransport::new(Cursor::new(output), Vec::new());
        let mut decoded = Vec::new();
        while let Some(bytes) = transport.receive_optional().expect("framed output") {
            decoded.push(serde_json::from_slice(&bytes).expect("response"));
        }
        decoded
    }

    #[rstest]
    fn loopback_round_trips_through_json() {
        let channel = LoopbackChannel::new(Echo);
        let result = channel.call("echo", json!({"a": [1, 2]})).expect("echo");
        assert_eq!(result, json!({"a": [1, 2]}));
    }

    #[rstest]
    fn loopback_rejects_calls_after_close() {
        let channel = LoopbackChannel::new(Echo);
        channel.close().expect("close");
        channel.close().expect("close twice");
        let error = channel.call("echo", Value::Null).expect_err("closed");
        assert_eq!(error.code, RpcCode::Unavailable);
    }

    #[rstest]
    fn serve_answers_requests_and_skips_notifications() {
        let mut input = frame(&JsonRpcRequest::with_id(1, "echo", json!("hi")));
        input.extend(frame(&json!({"jsonrpc": "2.0", "method": "echo"})));
        input.extend(frame(&JsonRpcRequest::with_id(2, "missing", Value::Null)));

        let mut output = Vec::new();
        serve(&Echo, Cursor::new(input), &mut output).expect("serve");

        let answered = responses(output);
        assert_eq!(answered.len(), 2);
        let first = answered.first().expect("first response");
        assert_eq!(first.id, Some(1));
        assert_eq!(first.result, Some(json!("hi")));
        let second = answered.get(1).expect("second response");
        assert_eq!(second.id, Some(2));
        assert_eq!(second.error.as_ref().map(|error| error.code), Some(METHOD_NOT_FOUND));
    }

    #[rstest]
    fn serve_reports_unparseable_payloads() {
        let input = b"Content-Length: 3\r\n\r\n{{{".to_vec();
        let mut output = Vec::new();
        serve(&Echo, Cursor::new(input), &mut output).expect("serve");

        let answered = responses(output);
        let only = answered.first().expect("one response");
        assert_eq!(only.id, None);
        assert_eq!(only.error.as_ref().map(|error| error.code), Some(PARSE_ERROR));
    }
}
