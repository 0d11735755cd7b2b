use std::time::Duration;

use orc_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcpError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request channel closed")]
    ChannelClosed,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
    #[error("backend refused handshake: {0}")]
    HandshakeRefused(String),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
    #[error("JSON encode/decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcpError::Spawn { .. } => ErrorKind::BackendMissing,
            // The reader task hits this on stdout EOF and the writer task hits
            // it on a failed stdin write — both mean the agent process is gone
            // mid-request, not that it spoke malformed protocol.
            AcpError::ChannelClosed => ErrorKind::BackendGone,
            AcpError::Transport(_) | AcpError::Json(_) => ErrorKind::ProtocolError,
            AcpError::Timeout(_) => ErrorKind::Timeout,
            AcpError::Cancelled => ErrorKind::Cancelled,
            AcpError::HandshakeRefused(_) => ErrorKind::HandshakeRefused,
            AcpError::Rpc { .. } => ErrorKind::ProtocolError,
        }
    }
}
