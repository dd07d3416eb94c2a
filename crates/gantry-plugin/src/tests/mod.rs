//! Crate-level behaviour tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{PluginError, RpcError};
use crate::host::ManagedPlugin;

mod behaviour;

/// A plugin that counts how often it is closed.
struct CountingPlugin {
    name: String,
    fail_close: bool,
    closes: AtomicUsize,
}

impl CountingPlugin {
    fn new(name: String, fail_close: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_close,
            closes: AtomicUsize::new(0),
        })
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ManagedPlugin for CountingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn signal_cancellation(&self) -> Result<(), RpcError> {
        Ok(())
    }

    fn close(&self) -> Result<(), PluginError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(PluginError::Kill {
                name: self.name.clone(),
                pid: 0,
                source: Arc::new(io::Error::other("process is stuck")),
            });
        }
        Ok(())
    }
}
