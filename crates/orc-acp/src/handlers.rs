use async_trait::async_trait;
use serde_json::Value;

/// Answers server-initiated `fs/*` requests (spec §4.1 inbound dispatcher).
///
/// `codex`'s own MCP surface is client→server only, so it has no
/// analog for this; the default impl refuses every call so a backend that
/// never issues file callbacks needs no handler wiring.
#[async_trait]
pub trait FsHandler: Send + Sync {
    async fn read_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((super::protocol::ERR_METHOD_NOT_FOUND, "fs/read_text_file not implemented".into()))
    }

    async fn write_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((super::protocol::ERR_METHOD_NOT_FOUND, "fs/write_text_file not implemented".into()))
    }
}

#[async_trait]
pub trait TerminalHandler: Send + Sync {
    async fn create(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((super::protocol::ERR_METHOD_NOT_FOUND, "terminal/create not implemented".into()))
    }

    async fn output(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((super::protocol::ERR_METHOD_NOT_FOUND, "terminal/output not implemented".into()))
    }

    async fn kill(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((super::protocol::ERR_METHOD_NOT_FOUND, "terminal/kill not implemented".into()))
    }
}

#[async_trait]
pub trait PermissionHandler: Send + Sync {
    async fn request_permission(&self, params: Value) -> Result<Value, (i64, String)> {
        let _ = params;
        Err((
            super::protocol::ERR_METHOD_NOT_FOUND,
            "session/request_permission not implemented".into(),
        ))
    }
}

/// Bundles the three inbound-callback traits a backend may invoke; wired
/// into [`crate::JsonRpcTransport`] at spawn time.
pub struct Callbacks {
    pub fs: Box<dyn FsHandler>,
    pub terminal: Box<dyn TerminalHandler>,
    pub permission: Box<dyn PermissionHandler>,
}

struct NullFs;
#[async_trait]
impl FsHandler for NullFs {}
struct NullTerminal;
#[async_trait]
impl TerminalHandler for NullTerminal {}
struct NullPermission;
#[async_trait]
impl PermissionHandler for NullPermission {}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            fs: Box::new(NullFs),
            terminal: Box::new(NullTerminal),
            permission: Box::new(NullPermission),
        }
    }
}
