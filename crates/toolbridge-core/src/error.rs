//! Error types for Toolbridge Core

use crate::types::SessionState;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Toolbridge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the worker transport and its sessions
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Request {id} ({method}) timed out after {after:?}")]
    Timeout {
        method: String,
        id: u64,
        after: Duration,
    },

    #[error("Worker returned error: {message}")]
    Remote {
        code: Option<i64>,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Tool '{tool}' reported failure: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Worker process exited: {0}")]
    ProcessExited(String),

    #[error("Session not ready (state: {0:?})")]
    NotReady(SessionState),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Server configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Invalid server configuration: {0}")]
    Invalid(String),

    #[error("No configuration directory available")]
    NoConfigDir,
}

impl Error {
    /// Whether this error is a per-call deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Timeout { .. }))
    }

    /// Whether this error means the worker went away
    pub fn is_process_exited(&self) -> bool {
        matches!(self, Error::Transport(TransportError::ProcessExited(_)))
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_method() {
        let err = Error::Transport(TransportError::Timeout {
            method: "tools/call".to_string(),
            id: 7,
            after: Duration::from_secs(30),
        });

        assert!(err.is_timeout());
        assert!(!err.is_process_exited());
        assert!(err.to_string().contains("tools/call"));
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = Error::Transport(TransportError::ProcessExited("gone".to_string()));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!("Transport error: Worker process exited: gone"));
    }
}
