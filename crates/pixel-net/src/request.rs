//! Callback-driven requests and their handles.
//!
//! A request moves through `Idle -> Fetching -> {Completed, Failed}`, or
//! `Idle | Fetching -> Cancelled` on an explicit cancel. Every transition
//! happens under one lock, so exactly one terminal state is reached and at
//! most one of `on_complete` / `on_error` runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::NetError;
use crate::types::{Payload, RequestConfig};

pub(crate) type CompleteFn = Box<dyn FnOnce(Payload) + Send + 'static>;
pub(crate) type ErrorFn = Box<dyn FnOnce(NetError) + Send + 'static>;
pub(crate) type DisposeFn = Box<dyn FnOnce() + Send + 'static>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Lifecycle of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Fetching,
    Completed,
    Failed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A request plus the callbacks to run when it finishes.
pub struct NetRequest {
    id: RequestId,
    config: RequestConfig,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
    on_dispose: Option<DisposeFn>,
}

impl NetRequest {
    pub fn new(config: RequestConfig) -> Self {
        Self {
            id: RequestId::next(),
            config,
            on_complete: None,
            on_error: None,
            on_dispose: None,
        }
    }

    /// Called with the payload on success (cache hit or network).
    pub fn on_complete(mut self, f: impl FnOnce(Payload) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called with the error on failure.
    pub fn on_error(mut self, f: impl FnOnce(NetError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called once the request is finished, whatever the outcome,
    /// including cancellation or a panicking result callback.
    pub fn on_dispose(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(f));
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub(crate) fn into_parts(self) -> (RequestId, RequestConfig, Callbacks, Option<DisposeFn>) {
        (
            self.id,
            self.config,
            Callbacks {
                on_complete: self.on_complete,
                on_error: self.on_error,
            },
            self.on_dispose,
        )
    }
}

impl fmt::Debug for NetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetRequest")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

impl From<RequestConfig> for NetRequest {
    fn from(config: RequestConfig) -> Self {
        Self::new(config)
    }
}

/// Result callbacks, owned by the request task.
pub(crate) struct Callbacks {
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl Callbacks {
    pub(crate) fn complete(self, payload: Payload) {
        if let Some(f) = self.on_complete {
            f(payload);
        }
    }

    pub(crate) fn fail(self, error: NetError) {
        if let Some(f) = self.on_error {
            f(error);
        }
    }
}

/// State shared between a request task and its handle.
pub(crate) struct Shared {
    state: Mutex<RequestState>,
    on_dispose: Mutex<Option<DisposeFn>>,
}

impl Shared {
    pub(crate) fn new(on_dispose: Option<DisposeFn>) -> Self {
        Self {
            state: Mutex::new(RequestState::Idle),
            on_dispose: Mutex::new(on_dispose),
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        *lock(&self.state)
    }

    /// Move to `to` if the current state is one of `from`.
    pub(crate) fn transition(&self, from: &[RequestState], to: RequestState) -> bool {
        let mut state = lock(&self.state);
        if from.contains(&*state) {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Run the dispose callback, at most once.
    pub(crate) fn dispose(&self) {
        let callback = lock(&self.on_dispose).take();
        if let Some(f) = callback {
            f();
        }
    }
}

/// Runs the dispose callback when the request task ends, including by
/// abort or a panicking callback.
pub(crate) struct DisposeGuard(pub(crate) Arc<Shared>);

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Handle to a dispatched request.
///
/// Dropping the handle does not cancel the request.
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId, shared: Arc<Shared>, task: JoinHandle<()>) -> Self {
        Self { id, shared, task }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the request if its result has not arrived yet.
    ///
    /// Suppresses `on_complete` / `on_error` and runs `on_dispose`. Returns
    /// `false` (and does nothing) when the request already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self.shared.transition(
            &[RequestState::Idle, RequestState::Fetching],
            RequestState::Cancelled,
        );
        if cancelled {
            self.task.abort();
            debug!(request = %self.id, "request cancelled");
            self.shared.dispose();
        }
        cancelled
    }

    /// Wait for the request task to end and return the final state.
    pub async fn join(self) -> RequestState {
        // An aborted task reports a JoinError; the state already says Cancelled.
        let _ = self.task.await;
        self.shared.state()
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
