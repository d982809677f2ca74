//! Core type definitions for Toolbridge
//!
//! This module contains the shared types used across the crate: JSON-RPC
//! envelopes, MCP handshake and tool payloads, and session lifecycle state.

mod jsonrpc_types;
mod mcp_types;
mod session_types;

pub use jsonrpc_types::*;
pub use mcp_types::*;
pub use session_types::*;
