//! Worker sessions: handshake, tool invocation, teardown

use super::connection::{RpcConnection, SharedState};
use super::normalizer::normalize;
use super::process::WorkerProcess;
use super::protocol::ProtocolHandler;
use super::traits::ToolInvoker;
use super::transport::{StreamEvent, Transport};
use crate::config::{ServerCommand, TransportConfig};
use crate::error::{Error, Result, TransportError};
use crate::types::{
    tool_error_message, InitializeResult, JsonRpcRequest, SessionState, ToolInfo,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Start a session with default tuning.
///
/// Spawns the worker, completes the handshake, and returns a ready session.
pub async fn start_session(command: &ServerCommand) -> Result<Session> {
    Session::start(command, TransportConfig::default()).await
}

/// A ready-to-call connection to one worker process
pub struct Session {
    label: String,
    protocol: ProtocolHandler,
    connection: RpcConnection,
    process: Mutex<Option<WorkerProcess>>,
    state: SharedState,
    server: RwLock<Option<InitializeResult>>,
    config: TransportConfig,
}

impl Session {
    /// Spawn the worker and perform the handshake.
    ///
    /// A failed spawn surfaces immediately; a failed handshake tears the
    /// worker down before returning the error. Either way the session is
    /// gone and the caller must start a new one.
    pub async fn start(command: &ServerCommand, config: TransportConfig) -> Result<Self> {
        info!("Starting worker session: {}", command.command);

        let (transport, events, process) = Transport::spawn(command, config.channel_capacity)?;
        let session = Self::assemble(&command.command, transport, events, Some(process), config);
        session.finish_start().await
    }

    /// Run a session over already-connected streams (no process to supervise)
    pub async fn connect<R, W>(reader: R, writer: W, config: TransportConfig) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (transport, events) = Transport::from_streams(reader, writer, config.channel_capacity);
        let session = Self::assemble("stream", transport, events, None, config);
        session.finish_start().await
    }

    fn assemble(
        label: &str,
        transport: Transport,
        events: mpsc::Receiver<StreamEvent>,
        process: Option<WorkerProcess>,
        config: TransportConfig,
    ) -> Self {
        let protocol = ProtocolHandler::new(&config);
        let state: SharedState = Arc::new(RwLock::new(SessionState::Starting));
        let connection = RpcConnection::new(
            transport,
            events,
            protocol.clone(),
            config.request_timeout,
            Arc::clone(&state),
        );

        Self {
            label: label.to_string(),
            protocol,
            connection,
            process: Mutex::new(process),
            state,
            server: RwLock::new(None),
            config,
        }
    }

    async fn finish_start(self) -> Result<Self> {
        if let Err(e) = self.handshake().await {
            error!("Handshake with {} failed: {}", self.label, e);
            if let Err(stop_err) = self.stop().await {
                warn!("Teardown after failed handshake: {}", stop_err);
            }
            return Err(e);
        }
        Ok(self)
    }

    /// initialize request, then the initialized notification
    async fn handshake(&self) -> Result<()> {
        debug!("Initializing session for {}", self.label);

        let params = self.protocol.initialize_params()?;
        let result = self
            .connection
            .request(METHOD_INITIALIZE, Some(params))
            .await?;
        let init = self.protocol.parse_initialize_result(result)?;

        self.connection
            .notify(METHOD_INITIALIZED, Some(serde_json::json!({})))
            .await?;

        *self.server.write() = Some(init);

        let mut state = self.state.write();
        match *state {
            SessionState::Starting => {
                *state = SessionState::Ready;
                info!("Session ready for {}", self.label);
                Ok(())
            }
            other => Err(Error::Transport(TransportError::Handshake(format!(
                "worker went away during handshake (state: {:?})",
                other
            )))),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        let state = *self.state.read();
        if state.is_ready() {
            Ok(())
        } else {
            Err(Error::Transport(TransportError::NotReady(state)))
        }
    }

    /// Call a tool and return its normalized result
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        self.ensure_ready()?;
        debug!("Invoking tool {} on {}", name, self.label);

        let params = self.protocol.tool_call_params(name, args)?;
        let raw = self.connection.request(METHOD_TOOLS_CALL, Some(params)).await?;

        if let Some(message) = tool_error_message(&raw) {
            return Err(Error::Transport(TransportError::ToolFailed {
                tool: name.to_string(),
                message,
            }));
        }

        Ok(normalize(raw))
    }

    /// All tools the worker advertises, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        self.ensure_ready()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = self.protocol.tools_list_params(cursor.as_deref());
            let result = self.connection.request(METHOD_TOOLS_LIST, Some(params)).await?;
            let page = self.protocol.parse_tools_list_result(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!("{} lists {} tools", self.label, tools.len());
        Ok(tools)
    }

    /// Raw correlated call; the result is returned as sent
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.ensure_ready()?;
        self.connection.request(method, params).await
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<JsonRpcRequest> {
        self.connection.subscribe_notifications()
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// What the worker reported about itself during the handshake
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.server.read().clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.connection.pending_count()
    }

    /// Tear the worker down.
    ///
    /// Output listeners are detached first, then the worker gets SIGTERM and,
    /// after the grace period, SIGKILL. Every call still in flight is
    /// rejected with a process-exited error. Stopping twice is harmless.
    pub async fn stop(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Stopping);
        info!("Stopping session for {} (was {:?})", self.label, previous);

        let mut process = self.process.lock().await;
        self.connection.detach();

        let result = match process.take() {
            Some(mut worker) => {
                let exited = worker.terminate(self.config.shutdown_grace).await;
                if let Ok(status) = &exited {
                    debug!("Worker {} reaped: {}", worker.command(), status);
                }
                exited.map(|_| ())
            }
            None => Ok(()),
        };

        self.connection.close();
        self.connection.fail_pending("session stopped");
        *self.state.write() = SessionState::Stopped;
        result
    }
}

#[async_trait]
impl ToolInvoker for Session {
    async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        Session::invoke(self, name, args).await
    }
}
