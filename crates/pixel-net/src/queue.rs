//! Request queue: send a batch of requests one after another.
//!
//! Requests are dispatched in FIFO order with a fixed pause between
//! dispatches; each dispatched request then runs independently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::RequestDispatcher;
use crate::request::{lock, NetRequest, RequestHandle, RequestId, RequestState};

/// Requests waiting to be sent.
#[derive(Debug)]
pub struct RequestQueue {
    dispatcher: RequestDispatcher,
    pending: VecDeque<NetRequest>,
    interval: Duration,
}

impl RequestQueue {
    /// Empty queue using the dispatcher's configured interval.
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        let interval = dispatcher.config().queue_interval();
        Self {
            dispatcher,
            pending: VecDeque::new(),
            interval,
        }
    }

    /// Override the pause between dispatches.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Append a request.
    pub fn push(&mut self, request: impl Into<NetRequest>) -> RequestId {
        let request = request.into();
        let id = request.id();
        self.pending.push_back(request);
        id
    }

    /// Take a request back out before the queue starts.
    pub fn remove(&mut self, id: RequestId) -> Option<NetRequest> {
        let index = self.pending.iter().position(|r| r.id() == id)?;
        self.pending.remove(index)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Start dispatching.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(self) -> QueueHandle {
        let handles: Arc<Mutex<Vec<RequestHandle>>> = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));

        let Self {
            dispatcher,
            mut pending,
            interval,
        } = self;
        let driver_handles = Arc::clone(&handles);
        let driver_stopped = Arc::clone(&stopped);

        debug!(requests = pending.len(), interval_ms = interval.as_millis() as u64, "starting request queue");

        let driver = tokio::spawn(async move {
            let mut first = true;
            while let Some(request) = pending.pop_front() {
                if !first {
                    tokio::time::sleep(interval).await;
                }
                first = false;

                // Checked under the lock so `stop` either sees this handle or
                // we see the flag.
                let mut handles = lock(&driver_handles);
                if driver_stopped.load(Ordering::SeqCst) {
                    break;
                }
                handles.push(dispatcher.fetch(request));
            }
            if !pending.is_empty() {
                debug!(dropped = pending.len(), "queue stopped before all requests were sent");
            }
        });

        QueueHandle {
            driver,
            handles,
            stopped,
        }
    }
}

/// A running queue.
#[derive(Debug)]
pub struct QueueHandle {
    driver: JoinHandle<()>,
    handles: Arc<Mutex<Vec<RequestHandle>>>,
    stopped: Arc<AtomicBool>,
}

impl QueueHandle {
    /// Number of requests dispatched so far.
    pub fn dispatched(&self) -> usize {
        lock(&self.handles).len()
    }

    /// Stop dispatching and cancel every request still in flight.
    ///
    /// Requests that were never dispatched are dropped without callbacks.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.driver.abort();

        let handles = lock(&self.handles);
        let cancelled = handles.iter().filter(|h| h.cancel()).count();
        debug!(cancelled, "request queue stopped");
    }

    /// Wait for the queue to finish and every dispatched request to end.
    ///
    /// Returns the final state of each dispatched request, in dispatch order.
    pub async fn join(self) -> Vec<(RequestId, RequestState)> {
        let _ = self.driver.await;

        let handles = std::mem::take(&mut *lock(&self.handles));
        let mut states = Vec::with_capacity(handles.len());
        for handle in handles {
            let id = handle.id();
            states.push((id, handle.join().await));
        }
        states
    }
}
