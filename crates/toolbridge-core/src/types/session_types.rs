//! Session lifecycle types

use serde::{Deserialize, Serialize};

/// Lifecycle of the worker behind a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process spawned, handshake not finished
    Starting,
    /// Handshake complete, calls allowed
    Ready,
    /// Teardown in progress
    Stopping,
    /// Worker gone
    Stopped,
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopping | SessionState::Stopped)
    }
}
