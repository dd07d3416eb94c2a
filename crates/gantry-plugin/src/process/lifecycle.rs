//! Stopping plugin processes.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::PROCESS_TARGET;
use crate::error::PluginError;

/// How often an exiting plugin is polled during its grace period.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waits up to `grace` for the child to exit, then kills it.
pub(super) fn terminate_child(
    name: &str,
    child: &mut Child,
    grace: Duration,
) -> Result<(), PluginError> {
    let deadline = Instant::now().checked_add(grace);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: PROCESS_TARGET, plugin = name, ?status, "plugin exited");
                return Ok(());
            }
            Ok(None) if deadline.is_some_and(|limit| Instant::now() < limit) => {
                thread::sleep(EXIT_POLL_INTERVAL);
            }
            Ok(None) => {
                warn!(
                    target: PROCESS_TARGET,
                    plugin = name,
                    grace_ms = grace.as_millis(),
                    "plugin did not exit within its grace period, killing"
                );
                break;
            }
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    plugin = name,
                    %error,
                    "failed to check plugin status, killing"
                );
                break;
            }
        }
    }
    kill_child(name, child)
}

/// Kills the child and reaps it.
pub(super) fn kill_child(name: &str, child: &mut Child) -> Result<(), PluginError> {
    let pid = child.id();
    if let Err(source) = child.kill() {
        // The process may have exited between the last check and the kill.
        if matches!(child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }
        return Err(PluginError::Kill {
            name: name.to_owned(),
            pid,
            source: Arc::new(source),
        });
    }
    match child.wait() {
        Ok(status) => debug!(target: PROCESS_TARGET, plugin = name, ?status, "plugin killed"),
        Err(error) => warn!(target: PROCESS_TARGET, plugin = name, %error, "failed to reap plugin"),
    }
    Ok(())
}

/// Relays the plugin's stderr into the host log, one line per event.
pub(super) fn forward_stderr(name: &str, stderr: ChildStderr) {
    let plugin = name.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("{name}-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!(target: PROCESS_TARGET, plugin = %plugin, "{line}");
            }
        });
    if let Err(error) = spawned {
        warn!(target: PROCESS_TARGET, plugin = name, %error, "cannot relay plugin stderr");
    }
}
