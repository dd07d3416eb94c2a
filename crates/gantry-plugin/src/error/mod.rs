//! Errors raised while launching, calling, and closing plugins.
//!
//! Call failures are classified by [`RpcCode`] so callers can tell an
//! advisory "not implemented" apart from a broken channel. Lifecycle
//! failures use [`PluginError`], and best-effort fan-outs over many plugins
//! collect every failure into [`CloseErrors`] instead of stopping at the
//! first. I/O errors are wrapped in `Arc` so every error stays `Clone`.

use std::fmt;
use std::io;
use std::sync::Arc;

use gantry_rpc::MarshalError;
use thiserror::Error;

use crate::jsonrpc::{INTERNAL_ERROR, INVALID_PARAMS, JsonRpcError, METHOD_NOT_FOUND};

/// Code for a call abandoned because its scope was cancelled.
const REQUEST_CANCELLED: i64 = -32800;
/// Code for a call abandoned because its deadline passed.
const DEADLINE_EXCEEDED: i64 = -32001;
/// Code for a call made on a channel that is closed or broken.
const UNAVAILABLE: i64 = -32002;
/// Code for anything the peer did not classify.
const UNKNOWN: i64 = -32000;

/// Status classification of a failed plugin call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    /// The caller's scope was cancelled.
    Cancelled,
    /// The peer reported a failure without classifying it.
    Unknown,
    /// The request could not be accepted as sent.
    InvalidArgument,
    /// The caller's deadline passed before the plugin answered.
    DeadlineExceeded,
    /// The plugin does not serve this method.
    Unimplemented,
    /// The plugin failed while handling the request.
    Internal,
    /// The channel is closed or broken.
    Unavailable,
}

impl RpcCode {
    /// Returns the lowercase name used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
        }
    }

    /// Maps a JSON-RPC error code onto a status.
    #[must_use]
    pub const fn from_jsonrpc(code: i64) -> Self {
        match code {
            METHOD_NOT_FOUND => Self::Unimplemented,
            INVALID_PARAMS => Self::InvalidArgument,
            INTERNAL_ERROR => Self::Internal,
            REQUEST_CANCELLED => Self::Cancelled,
            DEADLINE_EXCEEDED => Self::DeadlineExceeded,
            UNAVAILABLE => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// Returns the JSON-RPC error code reported for this status.
    #[must_use]
    pub const fn to_jsonrpc(self) -> i64 {
        match self {
            Self::Cancelled => REQUEST_CANCELLED,
            Self::Unknown => UNKNOWN,
            Self::InvalidArgument => INVALID_PARAMS,
            Self::DeadlineExceeded => DEADLINE_EXCEEDED,
            Self::Unimplemented => METHOD_NOT_FOUND,
            Self::Internal => INTERNAL_ERROR,
            Self::Unavailable => UNAVAILABLE,
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed plugin call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    /// Status classification.
    pub code: RpcCode,
    /// Description from the peer or the local failure.
    pub message: String,
}

impl RpcError {
    /// Creates an error with the given status.
    #[must_use]
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The caller's scope was cancelled while waiting.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(RpcCode::Cancelled, "request scope cancelled")
    }

    /// The caller's deadline passed while waiting.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::new(RpcCode::DeadlineExceeded, "request deadline exceeded")
    }

    /// The channel is closed.
    #[must_use]
    pub fn channel_closed() -> Self {
        Self::new(RpcCode::Unavailable, "plugin channel closed")
    }

    /// The peer does not serve `method`.
    #[must_use]
    pub fn unimplemented(method: &str) -> Self {
        Self::new(RpcCode::Unimplemented, format!("method '{method}' not implemented"))
    }

    /// Returns `true` if the plugin reported the method as unimplemented.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        self.code == RpcCode::Unimplemented
    }

    /// Converts a JSON-RPC error object received from a peer.
    #[must_use]
    pub fn from_jsonrpc(error: JsonRpcError) -> Self {
        Self::new(RpcCode::from_jsonrpc(error.code), error.message)
    }

    /// Converts this error into a JSON-RPC error object for a peer.
    #[must_use]
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code.to_jsonrpc(),
            message: self.message.clone(),
            data: None,
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(error: TransportError) -> Self {
        Self::new(RpcCode::Unavailable, error.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(RpcCode::InvalidArgument, format!("JSON codec error: {error}"))
    }
}

impl From<MarshalError> for RpcError {
    fn from(error: MarshalError) -> Self {
        Self::new(RpcCode::InvalidArgument, error.to_string())
    }
}

/// Transport-layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream between messages.
    #[error("connection closed")]
    Closed,

    /// Missing Content-Length header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// Invalid header format.
    #[error("invalid header format")]
    InvalidHeader,
}

/// Errors arising from the plugin process lifecycle.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The plugin binary was not found.
    #[error("plugin binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin process could not be started.
    #[error("plugin '{command}' failed to start: {message}")]
    SpawnFailed {
        /// The command that was launched.
        command: String,
        /// Human-readable failure description.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin process could not be stopped.
    #[error("plugin '{name}' (pid {pid}) could not be stopped")]
    Kill {
        /// Plugin name.
        name: String,
        /// Process ID.
        pid: u32,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A call made during a fan-out over plugins failed.
    #[error("plugin '{name}' failed: {source}")]
    Call {
        /// Plugin name.
        name: String,
        /// The call failure.
        #[source]
        source: RpcError,
    },
}

/// Every failure from a best-effort operation over several plugins.
#[derive(Debug, Clone, Default)]
pub struct CloseErrors {
    failures: Vec<PluginError>,
}

impl CloseErrors {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Records a failure.
    pub fn push(&mut self, failure: PluginError) {
        self.failures.push(failure);
    }

    /// Appends every failure from `other`.
    pub fn extend(&mut self, other: Self) {
        self.failures.extend(other.failures);
    }

    /// Returns the recorded failures in the order they occurred.
    #[must_use]
    pub const fn failures(&self) -> &[PluginError] {
        self.failures.as_slice()
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `Ok(())` if nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one failure was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.failures.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseErrors {}

impl From<PluginError> for CloseErrors {
    fn from(failure: PluginError) -> Self {
        Self {
            failures: vec![failure],
        }
    }
}
