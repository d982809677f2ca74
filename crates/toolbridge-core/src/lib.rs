//! Toolbridge Core Library
//!
//! This crate drives external MCP tool servers ("workers") over stdio:
//! - Worker process supervision with graceful-then-forced teardown
//! - Newline-delimited JSON-RPC 2.0 framing and request correlation
//! - The MCP initialize handshake and `tools/*` calls
//! - Normalization of tool results into plain JSON values
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     toolbridge-core                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mcp/          - Transport, correlation, sessions           │
//! │  config.rs     - Transport tuning, worker launch commands   │
//! │  types/        - Shared type definitions                    │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use toolbridge_core::{start_session, ServerCommand};
//!
//! # async fn run() -> toolbridge_core::Result<()> {
//! let command = ServerCommand::new("npx").with_args(["-y", "@modelcontextprotocol/server-everything"]);
//! let session = start_session(&command).await?;
//! let sum = session.invoke("add", serde_json::json!({"a": 1, "b": 2})).await?;
//! println!("{}", sum);
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, Error, Result, TransportError};
pub use types::*;

// Re-export configuration
pub use config::{ServerCommand, ServerConfigs, TransportConfig};

// Re-export MCP client components
pub use mcp::{
    normalize, start_session, FrameReader, McpMessage, ProtocolHandler, Session, ToolHandle,
    ToolInvoker,
};
