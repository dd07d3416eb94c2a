//! A shareable, one-shot cancellation flag.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Signals that the work holding a clone of this token should stop waiting.
///
/// Clones share the same flag. Cancellation is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancellationToken {
    /// Creates a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is already cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    /// Cancels the token, waking every waiter. Repeat calls do nothing.
    pub fn cancel(&self) {
        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !*cancelled {
            *cancelled = true;
            self.shared.signal.notify_all();
        }
    }

    /// Returns `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Blocks for up to `timeout` waiting for cancellation.
    ///
    /// Returns `true` if the token is cancelled when the wait ends.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (cancelled, _) = self
            .shared
            .signal
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cancelled
    }
}
