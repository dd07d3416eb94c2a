//! Request scopes and their cancellation on shutdown.
//!
//! Every call against a plugin runs inside a [`RequestScope`] issued by a
//! [`PluginContext`]. The context tracks the cancellation token of each live
//! scope; closing it cancels all of them exactly once and then closes the
//! attached [`Host`]. Scopes requested after close come back already
//! cancelled, so callers see a clean `Cancelled` error rather than a hang.

mod token;

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use gantry_config::HostConfig;
use tracing::{debug, trace};

pub use token::CancellationToken;

use crate::error::{CloseErrors, RpcCode, RpcError};
use crate::host::Host;

/// Log target for request scope operations.
const CONTEXT_TARGET: &str = "gantry_plugin::context";

/// Upper bound on how long a waiting caller goes without rechecking its scope.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of the outstanding request scopes for a set of plugins.
///
/// Clones share the same scope set, so one clone may close the context while
/// others are still issuing requests.
#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<Inner>,
}

struct Inner {
    scopes: Mutex<Scopes>,
    host: Mutex<Option<Arc<dyn Host>>>,
    call_timeout: Option<Duration>,
}

enum Scopes {
    Open {
        handles: HashMap<u64, CancellationToken>,
        next_id: u64,
    },
    Closed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PluginContext {
    /// Creates an open context whose scopes use the configured call timeout.
    #[must_use]
    pub fn new(config: &HostConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                scopes: Mutex::new(Scopes::Open {
                    handles: HashMap::new(),
                    next_id: 0,
                }),
                host: Mutex::new(None),
                call_timeout: config.call_timeout,
            }),
        }
    }

    /// Attaches the host closed along with this context.
    #[must_use]
    pub fn with_host(self, host: Arc<dyn Host>) -> Self {
        *lock(&self.inner.host) = Some(host);
        self
    }

    /// Returns the attached host until the context is closed.
    #[must_use]
    pub fn host(&self) -> Option<Arc<dyn Host>> {
        lock(&self.inner.host).clone()
    }

    /// Returns the deadline applied to each new scope, if any.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.inner.call_timeout
    }

    /// Issues a scope for one unit of work.
    ///
    /// After [`close`](Self::close) the scope is returned already cancelled.
    #[must_use]
    pub fn request(&self) -> RequestScope {
        let token = CancellationToken::new();
        let deadline = self
            .inner
            .call_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        let mut scopes = lock(&self.inner.scopes);
        let Scopes::Open { handles, next_id } = &mut *scopes else {
            trace!(target: CONTEXT_TARGET, "request issued after close");
            return RequestScope {
                id: None,
                token: CancellationToken::cancelled(),
                deadline,
                owner: Weak::new(),
            };
        };
        let id = *next_id;
        *next_id = next_id.wrapping_add(1);
        handles.insert(id, token.clone());
        RequestScope {
            id: Some(id),
            token,
            deadline,
            owner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the number of scopes that are registered and not yet dropped.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        match &*lock(&self.inner.scopes) {
            Scopes::Open { handles, .. } => handles.len(),
            Scopes::Closed => 0,
        }
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*lock(&self.inner.scopes), Scopes::Closed)
    }

    /// Cancels every outstanding scope and closes the attached host.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns every failure reported while closing the host.
    pub fn close(&self) -> Result<(), CloseErrors> {
        let handles = {
            let mut scopes = lock(&self.inner.scopes);
            match std::mem::replace(&mut *scopes, Scopes::Closed) {
                Scopes::Open { handles, .. } => handles,
                Scopes::Closed => return Ok(()),
            }
        };

        debug!(
            target: CONTEXT_TARGET,
            outstanding = handles.len(),
            "closing plugin context"
        );
        for token in handles.into_values() {
            token.cancel();
        }

        let host = lock(&self.inner.host).take();
        host.map_or(Ok(()), |attached| attached.close())
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("closed", &self.is_closed())
            .field("outstanding", &self.outstanding())
            .field("call_timeout", &self.inner.call_timeout)
            .finish_non_exhaustive()
    }
}

/// A cancellable scope for one call, deregistered when dropped.
#[derive(Debug)]
pub struct RequestScope {
    id: Option<u64>,
    token: CancellationToken,
    deadline: Option<Instant>,
    owner: Weak<Inner>,
}

impl RequestScope {
    /// Returns the scope's cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the instant after which calls in this scope give up.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the scope is cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` or `DeadlineExceeded`.
    pub fn check(&self) -> Result<(), RpcError> {
        if self.token.is_cancelled() {
            return Err(RpcError::cancelled());
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(RpcError::deadline_exceeded());
        }
        Ok(())
    }

    /// Runs `work` on a worker thread and waits for it within this scope.
    ///
    /// The caller is released as soon as the scope is cancelled or its
    /// deadline passes; the worker keeps running in the background and its
    /// result is discarded.
    ///
    /// # Errors
    ///
    /// Returns the work's own error, `Cancelled`, `DeadlineExceeded`, or
    /// `Internal` if the worker could not be started or panicked.
    pub fn run<T, F>(&self, work: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RpcError> + Send + 'static,
    {
        self.check()?;
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name(String::from("gantry-call"))
            .spawn(move || {
                if sender.send(work()).is_err() {
                    trace!(
                        target: CONTEXT_TARGET,
                        "caller stopped waiting before the call finished"
                    );
                }
            })
            .map_err(|error| {
                RpcError::new(RpcCode::Internal, format!("failed to start call worker: {error}"))
            })?;

        loop {
            match receiver.recv_timeout(self.next_wait()) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => self.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RpcError::new(
                        RpcCode::Internal,
                        "call worker exited without a result",
                    ));
                }
            }
        }
    }

    fn next_wait(&self) -> Duration {
        self.deadline.map_or(POLL_INTERVAL, |deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL)
        })
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let (Some(id), Some(owner)) = (self.id, self.owner.upgrade()) else {
            return;
        };
        if let Scopes::Open { handles, .. } = &mut *lock(&owner.scopes) {
            handles.remove(&id);
        }
    }
}
