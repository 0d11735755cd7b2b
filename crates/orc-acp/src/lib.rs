#![forbid(unsafe_code)]
//! Stdio JSON-RPC transport for agent-client-protocol backends.
//!
//! Grounded on `codex/src/mcp/jsonrpc.rs`'s writer/reader task split and
//! request-correlation table, extended with an inbound dispatcher for
//! server-initiated `fs/*`, `terminal/*`, and `session/request_permission`
//! calls that `codex`'s client-only MCP surface never needed.

mod client;
mod error;
mod handlers;
mod jsonrpc;
mod protocol;

pub use client::AcpClient;
pub use error::AcpError;
pub use handlers::{Callbacks, FsHandler, PermissionHandler, TerminalHandler};
pub use jsonrpc::{EventStream, JsonRpcTransport, StdioServerConfig};
pub use protocol::{
    InboundRequest, InitializeParams, NewSessionParams, PromptParams, RequestId, SessionUpdate,
    ERR_CANCELLED, ERR_METHOD_NOT_FOUND,
};
