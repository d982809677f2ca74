//! JSON-RPC connection over a worker transport
//!
//! Owns the dispatch loop that turns stream events into frames, frames into
//! messages, and responses into settled calls.

use super::correlator::{CallOutcome, Correlator};
use super::framing::FrameReader;
use super::protocol::{McpMessage, ProtocolHandler};
use super::transport::{StreamEvent, Transport};
use crate::error::{Error, Result, TransportError};
use crate::types::{JsonRpcRequest, SessionState};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Lifecycle state shared between a session and its dispatch loop
pub type SharedState = Arc<RwLock<SessionState>>;

/// Correlated request/response connection to one worker
pub struct RpcConnection {
    transport: Arc<Transport>,
    correlator: Arc<Correlator>,
    notification_tx: broadcast::Sender<JsonRpcRequest>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    pub fn new(
        transport: Transport,
        events: mpsc::Receiver<StreamEvent>,
        protocol: ProtocolHandler,
        request_timeout: Duration,
        state: SharedState,
    ) -> Self {
        let transport = Arc::new(transport);
        let correlator = Arc::new(Correlator::new(request_timeout));
        let (notification_tx, _) = broadcast::channel(256);

        let dispatch_task = tokio::spawn(Self::dispatch_loop(
            Arc::clone(&transport),
            events,
            Arc::clone(&correlator),
            protocol,
            notification_tx.clone(),
            state,
        ));

        Self {
            transport,
            correlator,
            notification_tx,
            dispatch_task: Mutex::new(Some(dispatch_task)),
        }
    }

    /// Send a request and wait for its response or deadline
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let (id, rx) = self.correlator.register(method);
        let request = JsonRpcRequest::new(id, method, params);

        debug!("Sending request {} method={}", id, method);
        let mut rx = rx;

        // The deadline also covers a write stuck behind a worker that stopped reading stdin.
        tokio::select! {
            sent = self.transport.send_request(&request) => {
                if let Err(e) = sent {
                    self.correlator.cancel(id);
                    return Err(e);
                }
            }
            outcome = &mut rx => return Self::settle(outcome),
        }

        Self::settle(rx.await)
    }

    fn settle(
        outcome: std::result::Result<CallOutcome, oneshot::error::RecvError>,
    ) -> Result<serde_json::Value> {
        outcome.map_err(|_| {
            Error::Transport(TransportError::ProcessExited(
                "response channel closed".to_string(),
            ))
        })?
    }

    /// Send a notification; no response is expected or tracked
    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        debug!("Sending notification method={}", method);
        self.transport
            .send_request(&JsonRpcRequest::notification(method, params))
            .await
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<JsonRpcRequest> {
        self.notification_tx.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Reject every in-flight call
    pub fn fail_pending(&self, reason: &str) -> usize {
        self.correlator.fail_all(reason)
    }

    /// Stop processing worker output; no frame is handled after this returns
    pub fn detach(&self) {
        self.transport.detach();
        if let Some(task) = self.dispatch_task.lock().take() {
            task.abort();
        }
    }

    /// Detach and stop writing to the worker
    pub fn close(&self) {
        self.detach();
        self.transport.close();
    }

    async fn dispatch_loop(
        transport: Arc<Transport>,
        mut events: mpsc::Receiver<StreamEvent>,
        correlator: Arc<Correlator>,
        protocol: ProtocolHandler,
        notification_tx: broadcast::Sender<JsonRpcRequest>,
        state: SharedState,
    ) {
        let mut frames = FrameReader::new();

        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Chunk(bytes) => {
                    for frame in frames.feed(&bytes) {
                        Self::handle_frame(
                            &frame,
                            &transport,
                            &correlator,
                            &protocol,
                            &notification_tx,
                        )
                        .await;
                    }
                }
                StreamEvent::Closed => {
                    if let Some(frame) = frames.finish() {
                        Self::handle_frame(
                            &frame,
                            &transport,
                            &correlator,
                            &protocol,
                            &notification_tx,
                        )
                        .await;
                    }
                    break;
                }
            }
        }

        let unexpected = {
            let mut current = state.write();
            if current.is_terminal() {
                false
            } else {
                *current = SessionState::Stopped;
                true
            }
        };

        if unexpected {
            info!("Worker output closed unexpectedly");
            correlator.fail_all("worker closed its output stream");
        }
        debug!("Dispatch loop ended");
    }

    async fn handle_frame(
        frame: &str,
        transport: &Transport,
        correlator: &Correlator,
        protocol: &ProtocolHandler,
        notification_tx: &broadcast::Sender<JsonRpcRequest>,
    ) {
        trace!("Worker frame: {}", frame);

        match protocol.parse_frame(frame) {
            Some(McpMessage::Response(response)) => {
                correlator.resolve(response);
            }
            Some(McpMessage::Notification(notification)) => {
                debug!("Worker notification: {}", notification.method);
                // No subscribers is fine
                let _ = notification_tx.send(notification);
            }
            Some(McpMessage::WorkerRequest(request)) => {
                debug!("Worker request: {}", request.method);
                let reply = protocol.create_worker_reply(&request);
                if let Err(e) = transport.send_response(&reply).await {
                    error!("Failed to answer worker request {}: {}", request.method, e);
                }
            }
            None => {}
        }
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        self.close();
        self.correlator.fail_all("connection dropped");
    }
}
