//! A plugin running as a child process, spoken to over its stdio.

mod launch;
mod lifecycle;

use std::io;
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gantry_config::HostConfig;
use serde_json::Value;
use tracing::{debug, warn};

pub use launch::PluginLaunch;

use crate::channel::PluginChannel;
use crate::error::{PluginError, RpcCode, RpcError};
use crate::jsonrpc::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, next_request_id};
use crate::transport::FramedTransport;

/// Log target for plugin process operations.
pub(crate) const PROCESS_TARGET: &str = "gantry_plugin::process";

/// Maximum number of messages read while waiting for one response.
const MAX_RESPONSE_ITERATIONS: usize = 100;

type SharedTransport = Arc<Mutex<FramedTransport>>;

enum ProcessState {
    Running {
        child: Child,
        transport: SharedTransport,
    },
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Recover from poisoning so shutdown still works after a panicking call.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running plugin process and its JSON-RPC channel.
///
/// The wrapper exclusively owns the child. Calls are serialised over the
/// channel; [`close`](PluginChannel::close) may run concurrently with them
/// and leaves them failing with `Unavailable` rather than hanging.
pub struct PluginProcess {
    name: String,
    shutdown_grace: Duration,
    state: Mutex<ProcessState>,
}

impl PluginProcess {
    /// Starts the plugin described by `launch`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::BinaryNotFound`] if the command does not exist
    /// and [`PluginError::SpawnFailed`] for any other launch failure.
    pub fn launch(launch: &PluginLaunch, config: &HostConfig) -> Result<Self, PluginError> {
        let name = launch.name().to_owned();
        debug!(
            target: PROCESS_TARGET,
            plugin = %name,
            command = %launch.command().display(),
            args = ?launch.argv(),
            "spawning plugin process"
        );

        let mut child = launch.command_for(config).spawn().map_err(|source| {
            let command = launch.command().display().to_string();
            if source.kind() == io::ErrorKind::NotFound {
                PluginError::BinaryNotFound {
                    command,
                    source: Arc::new(source),
                }
            } else {
                PluginError::SpawnFailed {
                    command,
                    message: String::from("could not start process"),
                    source: Arc::new(source),
                }
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            lifecycle::kill_child(&name, &mut child)?;
            return Err(PluginError::SpawnFailed {
                command: launch.command().display().to_string(),
                message: String::from("failed to capture stdio"),
                source: Arc::new(io::Error::other("no stdin or stdout")),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            lifecycle::forward_stderr(&name, stderr);
        }

        debug!(target: PROCESS_TARGET, plugin = %name, pid = child.id(), "plugin process spawned");
        Ok(Self {
            name,
            shutdown_grace: config.shutdown_grace,
            state: Mutex::new(ProcessState::Running {
                child,
                transport: Arc::new(Mutex::new(FramedTransport::new(stdout, stdin))),
            }),
        })
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the process ID while the plugin is running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match &*lock(&self.state) {
            ProcessState::Running { child, .. } => Some(child.id()),
            ProcessState::Stopped => None,
        }
    }

    /// Returns `true` until the plugin is closed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), ProcessState::Running { .. })
    }

    fn transport(&self) -> Option<SharedTransport> {
        match &*lock(&self.state) {
            ProcessState::Running { transport, .. } => Some(Arc::clone(transport)),
            ProcessState::Stopped => None,
        }
    }

    /// Reads messages until the response to `request_id` arrives.
    ///
    /// Responses to abandoned requests and plugin-initiated messages are
    /// skipped, up to a bounded number of messages.
    fn receive_response(
        &self,
        transport: &mut FramedTransport,
        request_id: i64,
    ) -> Result<JsonRpcResponse, RpcError> {
        for _ in 0..MAX_RESPONSE_ITERATIONS {
            match JsonRpcMessage::from_bytes(&transport.receive()?)? {
                JsonRpcMessage::Response(response) if response.id == Some(request_id) => {
                    return Ok(response);
                }
                JsonRpcMessage::Response(response) => {
                    warn!(
                        target: PROCESS_TARGET,
                        plugin = %self.name,
                        expected = request_id,
                        received = ?response.id,
                        "skipping response with non-matching ID"
                    );
                }
                JsonRpcMessage::Request(request) => {
                    debug!(
                        target: PROCESS_TARGET,
                        plugin = %self.name,
                        method = %request.method,
                        "ignoring plugin-initiated message"
                    );
                }
            }
        }
        warn!(
            target: PROCESS_TARGET,
            plugin = %self.name,
            request_id,
            max_iterations = MAX_RESPONSE_ITERATIONS,
            "giving up on response after reaching maximum iterations"
        );
        Err(RpcError::new(
            RpcCode::Internal,
            format!("no response to request {request_id} after {MAX_RESPONSE_ITERATIONS} messages"),
        ))
    }
}

impl PluginChannel for PluginProcess {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let shared = self.transport().ok_or_else(RpcError::channel_closed)?;
        let mut transport = lock(&shared);

        let request_id = next_request_id();
        let payload = serde_json::to_vec(&JsonRpcRequest::with_id(request_id, method, params))?;
        debug!(
            target: PROCESS_TARGET,
            plugin = %self.name,
            method,
            id = request_id,
            "sending request"
        );
        transport.send(&payload)?;

        let response = self.receive_response(&mut transport, request_id)?;
        if let Some(error) = response.error {
            return Err(RpcError::from_jsonrpc(error));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn close(&self) -> Result<(), PluginError> {
        let previous = std::mem::replace(&mut *lock(&self.state), ProcessState::Stopped);
        let ProcessState::Running {
            mut child,
            transport,
        } = previous
        else {
            return Ok(());
        };
        debug!(target: PROCESS_TARGET, plugin = %self.name, pid = child.id(), "closing plugin");
        // Releasing the transport closes the plugin's stdin unless a call is
        // still in flight; either way the child is gone after the grace period.
        drop(transport);
        lifecycle::terminate_child(&self.name, &mut child, self.shutdown_grace)
    }
}

impl Drop for PluginProcess {
    fn drop(&mut self) {
        let previous = std::mem::replace(&mut *lock(&self.state), ProcessState::Stopped);
        let ProcessState::Running { mut child, .. } = previous else {
            return;
        };
        if let Err(error) = lifecycle::kill_child(&self.name, &mut child) {
            warn!(
                target: PROCESS_TARGET,
                plugin = %self.name,
                %error,
                "failed to kill plugin on drop"
            );
        }
    }
}

impl std::fmt::Debug for PluginProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProcess")
            .field("name", &self.name)
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
