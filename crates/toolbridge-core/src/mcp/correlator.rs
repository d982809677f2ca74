//! Request/response correlation
//!
//! Every outgoing request gets a fresh id and an entry in the pending table.
//! An entry leaves the table exactly once: when its response arrives, when
//! its deadline fires, or when the session is torn down.

use crate::error::{Error, Result, TransportError};
use crate::types::JsonRpcResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome delivered to the caller awaiting a request
pub type CallOutcome = Result<serde_json::Value>;

struct PendingRequest {
    method: String,
    responder: oneshot::Sender<CallOutcome>,
    deadline: JoinHandle<()>,
}

type PendingTable = Arc<Mutex<HashMap<u64, PendingRequest>>>;

/// Pending request table with per-entry deadlines
pub struct Correlator {
    next_id: AtomicU64,
    pending: PendingTable,
    timeout: Duration,
}

impl Correlator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Allocate an id, record the pending entry and arm its deadline.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, method: &str) -> (u64, oneshot::Receiver<CallOutcome>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (responder, rx) = oneshot::channel();

        // The deadline task needs the lock to remove the entry, so it cannot
        // observe the table before the insert below.
        let mut table = self.pending.lock();
        let deadline = tokio::spawn(Self::deadline_task(
            Arc::clone(&self.pending),
            id,
            method.to_string(),
            self.timeout,
        ));
        table.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                responder,
                deadline,
            },
        );

        debug!("Registered request {} ({})", id, method);
        (id, rx)
    }

    async fn deadline_task(pending: PendingTable, id: u64, method: String, after: Duration) {
        tokio::time::sleep(after).await;

        let entry = pending.lock().remove(&id);
        if let Some(entry) = entry {
            warn!("Request {} ({}) timed out after {:?}", id, method, after);
            let _ = entry
                .responder
                .send(Err(Error::Transport(TransportError::Timeout { method, id, after })));
        }
    }

    /// Settle the pending entry matching this response.
    ///
    /// Returns false when no entry matched (unknown, duplicate, or already
    /// timed out); such responses are ignored.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.correlation_id() else {
            warn!("Ignoring response with unusable id: {:?}", response.id);
            return false;
        };

        let entry = self.pending.lock().remove(&id);
        let Some(entry) = entry else {
            warn!("Received response for unknown request: {}", id);
            return false;
        };

        entry.deadline.abort();
        debug!("Delivering response for request {} ({})", id, entry.method);

        let outcome = response.into_outcome().map_err(Error::Transport);
        if entry.responder.send(outcome).is_err() {
            debug!("Caller for request {} is no longer waiting", id);
        }
        true
    }

    /// Drop an entry whose request never reached the worker
    pub fn cancel(&self, id: u64) {
        if let Some(entry) = self.pending.lock().remove(&id) {
            entry.deadline.abort();
        }
    }

    /// Reject every pending entry with a process-exited error
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<(u64, PendingRequest)> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (id, entry) in drained {
            entry.deadline.abort();
            debug!("Rejecting request {} ({}): {}", id, entry.method, reason);
            let _ = entry
                .responder
                .send(Err(Error::Transport(TransportError::ProcessExited(
                    reason.to_string(),
                ))));
        }

        if count > 0 {
            warn!("Rejected {} pending request(s): {}", count, reason);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.lock().contains_key(&id)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
