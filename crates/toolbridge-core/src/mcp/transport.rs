//! Stdio transport for the worker process

use super::process::WorkerProcess;
use crate::config::ServerCommand;
use crate::error::{Error, Result, TransportError};
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use parking_lot::Mutex;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

const READ_CHUNK_BYTES: usize = 8192;

/// Raw output stream events, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(Vec<u8>),
    Closed,
}

/// Transport layer over the worker's stdio.
///
/// A single writer task owns stdin, so concurrent senders never interleave
/// frames. Stdout chunks are forwarded as [`StreamEvent`]s on a channel.
pub struct Transport {
    /// Channel to the stdin writer task
    stdin_tx: mpsc::Sender<String>,
    /// Stdout/stderr listeners, aborted on detach
    listeners: Mutex<Vec<JoinHandle<()>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Spawn the worker and wire its stdio.
    ///
    /// The worker inherits the ambient environment; `command.env` entries
    /// override it.
    pub fn spawn(
        command: &ServerCommand,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<StreamEvent>, WorkerProcess)> {
        debug!("Spawning worker: {} {:?}", command.command, command.args);

        let mut cmd = Command::new(&command.command);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Transport(TransportError::SpawnFailed(format!(
                "{}: {}",
                command.command, e
            )))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::Transport(TransportError::SpawnFailed("Failed to capture stdin".to_string()))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Transport(TransportError::SpawnFailed("Failed to capture stdout".to_string()))
        })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            Error::Transport(TransportError::SpawnFailed("Failed to capture stderr".to_string()))
        })?;

        let (transport, events) = Self::from_streams(stdout, stdin, capacity);

        // Drain stderr so the worker can't deadlock on a full pipe.
        transport
            .listeners
            .lock()
            .push(tokio::spawn(Self::read_stderr_task(stderr)));

        Ok((transport, events, WorkerProcess::new(child, &command.command)))
    }

    /// Wire a transport over arbitrary streams
    pub fn from_streams<R, W>(
        reader: R,
        writer: W,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<StreamEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (stdin_tx, stdin_rx) = mpsc::channel::<String>(capacity);
        let (events_tx, events_rx) = mpsc::channel::<StreamEvent>(capacity);

        let writer_task = tokio::spawn(Self::write_stdin_task(writer, stdin_rx));
        let reader_task = tokio::spawn(Self::read_stdout_task(reader, events_tx));

        (
            Self {
                stdin_tx,
                listeners: Mutex::new(vec![reader_task]),
                writer_task: Mutex::new(Some(writer_task)),
            },
            events_rx,
        )
    }

    /// Background task to write frames to stdin
    async fn write_stdin_task<W: AsyncWrite + Unpin>(mut stdin: W, mut rx: mpsc::Receiver<String>) {
        while let Some(data) = rx.recv().await {
            trace!("Sending to stdin: {}", data);
            let mut frame = data.into_bytes();
            frame.push(b'\n');
            if let Err(e) = stdin.write_all(&frame).await {
                error!("Failed to write to stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("Failed to flush stdin: {}", e);
                break;
            }
        }
        debug!("Stdin writer task ended");
    }

    /// Background task to forward raw stdout chunks
    async fn read_stdout_task<R: AsyncRead + Unpin>(mut stdout: R, tx: mpsc::Sender<StreamEvent>) {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];

        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => {
                    debug!("Worker stdout closed");
                    break;
                }
                Ok(n) => {
                    if tx.send(StreamEvent::Chunk(buf[..n].to_vec())).await.is_err() {
                        warn!("Failed to forward stdout chunk, channel closed");
                        return;
                    }
                }
                Err(e) => {
                    error!("Error reading worker stdout: {}", e);
                    break;
                }
            }
        }

        let _ = tx.send(StreamEvent::Closed).await;
    }

    /// Background task to drain stderr.
    async fn read_stderr_task(stderr: ChildStderr) {
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("Worker stderr closed");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        // Diagnostic only; workers often log here.
                        warn!("Worker stderr: {}", trimmed);
                    }
                }
                Err(e) => {
                    error!("Error reading worker stderr: {}", e);
                    break;
                }
            }
        }
    }

    /// Queue one frame for the writer task
    pub async fn send_frame(&self, frame: String) -> Result<()> {
        self.stdin_tx.send(frame).await.map_err(|_| {
            Error::Transport(TransportError::ChannelClosed(
                "worker stdin writer has stopped".to_string(),
            ))
        })
    }

    /// Send a JSON-RPC request or notification
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.send_frame(json).await
    }

    /// Send a JSON-RPC response to a worker request
    pub async fn send_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        self.send_frame(json).await
    }

    /// Stop listening to the worker's output streams
    pub fn detach(&self) {
        let listeners: Vec<JoinHandle<()>> = self.listeners.lock().drain(..).collect();
        for task in listeners {
            task.abort();
        }
    }

    /// Detach listeners and stop the writer
    pub fn close(&self) {
        self.detach();
        if let Some(task) = self.writer_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
