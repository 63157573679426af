//! # miga-mcp
//!
//! MCP (Model Context Protocol) tool server for the Miga bakery
//! operations platform.
//!
//! This crate exposes a fixed catalog of database tools — schema
//! inspection, gated read-only SQL, inventory computation and stored
//! procedure lookup — over two transports:
//!
//! - **stdio**: one trusted local client, line-framed JSON-RPC, a
//!   persistent connection pool for the process lifetime.
//! - **SSE**: many remote clients, each with an opaque session
//!   identifier, gated by a pre-shared API key; connections are opened
//!   per request and torn down afterwards.
//!
//! ## Architecture
//!
//! ```text
//! client
//!   │  transport (stdio pipe / SSE stream + message post)
//!   ▼
//! McpServer ── JSON-RPC method table
//!   │
//!   ▼
//! ToolExecutor ── catalog lookup, argument checks
//!   │
//!   ├─ QueryGate        read-only SQL admission (query_db only)
//!   ▼
//! ConnectionProvider ── scoped pool lease, released on every path
//!   │
//!   ▼
//! Postgres
//! ```
//!
//! Every failure that reaches the executor boundary is returned to the
//! caller as an error-flagged tool result; transport-level failures
//! (bad API key, unknown session) are rejected before dispatch.

pub mod error;
pub mod executor;
pub mod gate;
pub mod protocol;
pub mod server;
pub mod sse_transport;
pub mod tools;

// Re-export main types
pub use error::McpError;
pub use executor::ToolExecutor;
pub use gate::QueryGate;
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use sse_transport::{SessionRegistry, SseServer, SseServerState};
pub use tools::ToolRegistry;
