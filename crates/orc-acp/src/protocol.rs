use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RequestId = u64;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_AUTHENTICATE: &str = "authenticate";
pub const METHOD_SESSION_NEW: &str = "session/new";
pub const METHOD_SESSION_PROMPT: &str = "session/prompt";
pub const METHOD_SESSION_CANCEL: &str = "session/cancel";
pub const METHOD_SESSION_SET_MODE: &str = "session/set_mode";
pub const METHOD_SESSION_LOAD: &str = "session/load";
pub const METHOD_SESSION_UPDATE: &str = "session/update";

pub const METHOD_FS_READ_TEXT_FILE: &str = "fs/read_text_file";
pub const METHOD_FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";
pub const METHOD_TERMINAL_CREATE: &str = "terminal/create";
pub const METHOD_TERMINAL_OUTPUT: &str = "terminal/output";
pub const METHOD_TERMINAL_KILL: &str = "terminal/kill";
pub const METHOD_SESSION_REQUEST_PERMISSION: &str = "session/request_permission";

/// JSON-RPC error code for an unrecognized method, matching `codex/src/mcp.rs`'s
/// use of numeric JSON-RPC codes (`-32800` for cancellation).
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;
pub const ERR_CANCELLED: i64 = -32800;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    pub protocol_version: u32,
    #[serde(default)]
    pub client_info: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionParams {
    pub cwd: String,
    #[serde(default)]
    pub mcp_servers: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    pub session_id: String,
    pub prompt: Vec<Value>,
}

/// A `session/update` notification subtype, grounded on the same
/// broadcast-to-sinks pattern `codex/src/mcp.rs` uses for `session/update`-shaped
/// codex events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionUpdate {
    AgentMessageChunk { session_id: String, content: Value },
    ToolCall { session_id: String, call: Value },
    ToolCallUpdate { session_id: String, update: Value },
    Plan { session_id: String, entries: Value },
    Raw { method: String, params: Value },
}

/// An inbound, server-initiated request this transport must answer.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub id: RequestId,
    pub method: String,
    pub params: Value,
}
