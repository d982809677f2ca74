//! MCP client transport
//!
//! This module implements the client side of the MCP stdio transport: it
//! spawns a worker process and exchanges newline-delimited JSON-RPC 2.0
//! messages with it over stdin/stdout.
//!
//! # Architecture
//!
//! Data flows leaves-first:
//!
//! - `Transport` / `WorkerProcess` - spawn the worker, own its stdio and lifetime
//! - `FrameReader` - reassemble stdout chunks into newline-terminated frames
//! - `ProtocolHandler` - classify frames; malformed ones are dropped
//! - `Correlator` - match responses to pending requests by id, enforce deadlines
//! - `RpcConnection` - dispatch loop tying the above together
//! - `Session` - handshake, `invoke`, and teardown for callers
//! - `normalize` - strip envelope artifacts from tool results

mod connection;
mod correlator;
mod framing;
mod normalizer;
mod process;
mod protocol;
mod session;
pub mod traits;
mod transport;

// Re-export core traits
pub use traits::{ToolHandle, ToolInvoker};

// Re-export implementations
pub use connection::{RpcConnection, SharedState};
pub use correlator::{CallOutcome, Correlator};
pub use framing::FrameReader;
pub use normalizer::normalize;
pub use process::WorkerProcess;
pub use protocol::{McpMessage, ProtocolHandler};
pub use session::{start_session, Session};
pub use transport::{StreamEvent, Transport};
