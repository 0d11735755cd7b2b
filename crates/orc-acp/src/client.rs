use std::time::Duration;

use serde_json::Value;

use crate::error::AcpError;
use crate::handlers::Callbacks;
use crate::jsonrpc::{EventStream, JsonRpcTransport, StdioServerConfig};
use crate::protocol::{
    InitializeParams, NewSessionParams, PromptParams, METHOD_AUTHENTICATE, METHOD_INITIALIZE,
    METHOD_SESSION_LOAD, METHOD_SESSION_NEW, METHOD_SESSION_PROMPT, METHOD_SESSION_SET_MODE,
};

/// A single ACP backend connection plus the session it negotiated.
///
/// Named outbound methods (`initialize`/`authenticate`/`new_session`/
/// `prompt`/`cancel`) sit on top of [`JsonRpcTransport`]'s generic
/// `request`/`notify`, mirroring how `codex/src/mcp.rs` layers `initialize` /
/// `shutdown` helpers over its own raw `request`.
pub struct AcpClient {
    transport: JsonRpcTransport,
}

impl AcpClient {
    pub async fn spawn(config: StdioServerConfig, callbacks: Callbacks) -> Result<Self, AcpError> {
        let transport = JsonRpcTransport::spawn(config, callbacks).await?;
        Ok(Self { transport })
    }

    pub async fn initialize(&self, protocol_version: u32) -> Result<Value, AcpError> {
        let params = InitializeParams {
            protocol_version,
            client_info: Value::Null,
        };
        let timeout = self.transport.startup_timeout();
        self.transport
            .call(METHOD_INITIALIZE, serde_json::to_value(params)?, timeout)
            .await
            .map_err(|err| match err {
                AcpError::Rpc { message, .. } => AcpError::HandshakeRefused(message),
                other => other,
            })
    }

    pub async fn authenticate(&self, method_id: &str) -> Result<Value, AcpError> {
        let timeout = self.transport.startup_timeout();
        self.transport
            .call(
                METHOD_AUTHENTICATE,
                serde_json::json!({ "method_id": method_id }),
                timeout,
            )
            .await
            .map_err(|err| match err {
                AcpError::Rpc { message, .. } => AcpError::HandshakeRefused(message),
                other => other,
            })
    }

    pub async fn new_session(
        &self,
        params: NewSessionParams,
        timeout: Duration,
    ) -> Result<String, AcpError> {
        let result = self
            .transport
            .call(METHOD_SESSION_NEW, serde_json::to_value(params)?, timeout)
            .await?;
        result
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AcpError::Transport("session/new response missing session_id".into()))
    }

    pub async fn load_session(&self, session_id: &str, timeout: Duration) -> Result<Value, AcpError> {
        self.transport
            .call(
                METHOD_SESSION_LOAD,
                serde_json::json!({ "session_id": session_id }),
                timeout,
            )
            .await
    }

    pub async fn set_mode(&self, session_id: &str, mode: &str) -> Result<(), AcpError> {
        self.transport.notify(
            METHOD_SESSION_SET_MODE,
            serde_json::json!({ "session_id": session_id, "mode": mode }),
        )
    }

    pub async fn prompt(&self, params: PromptParams, timeout: Duration) -> Result<Value, AcpError> {
        self.transport
            .call(METHOD_SESSION_PROMPT, serde_json::to_value(params)?, timeout)
            .await
    }

    pub fn cancel(&self, session_id: &str) -> Result<(), AcpError> {
        self.transport.cancel(session_id)
    }

    pub async fn updates(&self) -> EventStream {
        self.transport.register_update_listener().await
    }
}
