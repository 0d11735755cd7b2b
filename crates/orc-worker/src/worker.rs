use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use orc_acp::{AcpClient, Callbacks, FsHandler, NewSessionParams, PromptParams, StdioServerConfig, TerminalHandler};
use orc_api::{ApiClient, WireShape};
use orc_cli::{CliClient, CliClientBuilder};
use orc_types::{
    compute_cost_usd, ErrorKind, Provider, ToolCall, ToolOp, Usage, WorkerId, WorkerMethod,
    WorkerSnapshot, WorkerState,
};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::WorkerError;
use crate::event::WorkerEvent;

/// ACP protocol version this core negotiates at `initialize` (spec §4.1).
const ACP_PROTOCOL_VERSION: u32 = 1;

/// Documented cap on the append-only output buffer (spec §9 "Streaming
/// without back-pressure loss": cap at a documented size and surface a
/// `Truncated` marker rather than dropping silently).
const MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

struct Inner {
    state: WorkerState,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    output: Vec<u8>,
    events: Vec<WorkerEvent>,
    tool_calls: Vec<ToolCall>,
    usage: Usage,
    cost_usd: f64,
    error: Option<ErrorKind>,
    output_truncated: bool,
    retained_until: Option<Instant>,
    send_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: WorkerState::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            output: Vec::new(),
            events: Vec::new(),
            tool_calls: Vec::new(),
            usage: Usage::default(),
            cost_usd: 0.0,
            error: None,
            output_truncated: false,
            retained_until: None,
            send_task: None,
        }
    }

    fn transition(&mut self, to: WorkerState) -> bool {
        if self.state.can_transition_to(to) {
            self.state = to;
            true
        } else {
            false
        }
    }

    fn append_output(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let remaining = MAX_OUTPUT_BYTES.saturating_sub(self.output.len());
        if bytes.len() > remaining {
            self.output.extend_from_slice(&bytes[..remaining]);
            self.output_truncated = true;
        } else {
            self.output.extend_from_slice(bytes);
        }
    }

    /// Commits a terminal outcome. A no-op once the worker is already
    /// terminal, so a race between `cancel` and a backend call resolving
    /// afterward can never overwrite the state `cancel` already committed.
    fn finish(&mut self, retention_window: Duration, error: Option<ErrorKind>, final_state: WorkerState) {
        if self.state.is_terminal() {
            return;
        }
        self.error = error;
        self.ended_at = Some(Utc::now());
        self.transition(final_state);
        self.retained_until = Some(Instant::now() + retention_window);
    }
}

enum Backend {
    Acp {
        client: AcpClient,
        session_id: AsyncMutex<Option<String>>,
    },
    Cli {
        client: CliClient,
        model_id: String,
    },
    Api {
        client: ApiClient,
        model_id: String,
        wire_shape: WireShape,
    },
}

/// Uniform handle over a backend session (spec §4.4, §9 "Polymorphism over
/// transports"): a tagged variant `{Acp, Cli, Api}` behind one shared
/// `{start, send, poll, read_output, cancel}` surface, generalized from
/// `codex`'s and `claude_code`'s two independent client structs into one
/// enum-dispatched type.
pub struct Worker {
    id: WorkerId,
    task_id: String,
    provider: Provider,
    method: WorkerMethod,
    retention_window: Duration,
    inner: Arc<AsyncMutex<Inner>>,
    backend: Arc<Backend>,
}

struct SendOutcome {
    text: String,
    usage: Usage,
}

impl Worker {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn method(&self) -> WorkerMethod {
        self.method
    }

    /// Launches an ACP-backed worker: spawns the backend process,
    /// negotiates `initialize`/`session/new`, and starts a background
    /// listener that appends `session/update` notifications to the output
    /// and event buffers as they arrive (spec §4.1 "Ordering guarantees").
    pub async fn start_acp(
        task_id: impl Into<String>,
        provider: Provider,
        server: StdioServerConfig,
        fs: Box<dyn FsHandler>,
        terminal: Box<dyn TerminalHandler>,
        cwd: impl Into<String>,
        handshake_timeout: Duration,
        retention_window: Duration,
    ) -> Result<Self, WorkerError> {
        let inner = Arc::new(AsyncMutex::new(Inner::new()));
        {
            let mut guard = inner.lock().await;
            guard.transition(WorkerState::Initializing);
        }

        let callbacks = Callbacks {
            fs: Box::new(RecordingFs { inner: inner.clone(), delegate: fs }),
            terminal: Box::new(RecordingTerminal { inner: inner.clone(), delegate: terminal }),
            permission: orc_acp::Callbacks::default().permission,
        };

        let client = match AcpClient::spawn(server, callbacks).await {
            Ok(client) => client,
            Err(err) => {
                let mut guard = inner.lock().await;
                guard.finish(retention_window, Some(err.kind()), WorkerState::Failed);
                return Err(err.into());
            }
        };

        if let Err(err) = client.initialize(ACP_PROTOCOL_VERSION).await {
            let mut guard = inner.lock().await;
            guard.finish(retention_window, Some(err.kind()), WorkerState::Failed);
            return Err(err.into());
        }

        let session_id = match client
            .new_session(
                NewSessionParams { cwd: cwd.into(), mcp_servers: vec![] },
                handshake_timeout,
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let mut guard = inner.lock().await;
                guard.finish(retention_window, Some(err.kind()), WorkerState::Failed);
                return Err(err.into());
            }
        };

        {
            let mut guard = inner.lock().await;
            guard.started_at = Some(Utc::now());
            guard.transition(WorkerState::Ready);
        }

        let backend = Arc::new(Backend::Acp {
            client,
            session_id: AsyncMutex::new(Some(session_id)),
        });

        spawn_acp_update_listener(backend.clone(), inner.clone());

        Ok(Self {
            id: WorkerId::new(),
            task_id: task_id.into(),
            provider,
            method: WorkerMethod::Acp,
            retention_window,
            inner,
            backend,
        })
    }

    /// Launches a CLI-backed worker. The process itself is not spawned
    /// until `send` (spec §4.4 "CLI: prepare argv"); `ready` here means the
    /// invocation is fully configured and the binary path has been
    /// resolved, the CLI analog of ACP's confirmed handshake.
    pub async fn start_cli(
        task_id: impl Into<String>,
        provider: Provider,
        builder: CliClientBuilder,
        retention_window: Duration,
    ) -> Result<Self, WorkerError> {
        let inner = Arc::new(AsyncMutex::new(Inner::new()));
        {
            let mut guard = inner.lock().await;
            guard.transition(WorkerState::Initializing);
        }

        let client = builder.build()?;
        let model_id = provider.model_id.clone();

        {
            let mut guard = inner.lock().await;
            guard.started_at = Some(Utc::now());
            guard.transition(WorkerState::Ready);
        }

        Ok(Self {
            id: WorkerId::new(),
            task_id: task_id.into(),
            provider,
            method: WorkerMethod::Cli,
            retention_window,
            inner,
            backend: Arc::new(Backend::Cli { client, model_id }),
        })
    }

    /// Launches an API-backed worker. No connection is opened until `send`
    /// (spec §4.4 "API: prepare request"); `wire_shape` is supplied by the
    /// caller rather than re-derived from `provider.kind` so this function
    /// stays agnostic of the provider-kind/wire-shape mapping policy.
    pub async fn start_api(
        task_id: impl Into<String>,
        provider: Provider,
        client: ApiClient,
        wire_shape: WireShape,
        retention_window: Duration,
    ) -> Result<Self, WorkerError> {
        let inner = Arc::new(AsyncMutex::new(Inner::new()));
        let model_id = provider.model_id.clone();
        {
            let mut guard = inner.lock().await;
            guard.transition(WorkerState::Initializing);
            guard.started_at = Some(Utc::now());
            guard.transition(WorkerState::Ready);
        }

        Ok(Self {
            id: WorkerId::new(),
            task_id: task_id.into(),
            provider,
            method: WorkerMethod::Api,
            retention_window,
            inner,
            backend: Arc::new(Backend::Api { client, model_id, wire_shape }),
        })
    }

    /// Issues `prompt`; only valid in `ready` (spec §4.4 `send`). Resolves
    /// asynchronously: this call returns once the worker has transitioned
    /// to `running`, not once the backend has replied. Use `poll`/
    /// `read_output` to observe completion.
    pub async fn send(&self, prompt: impl Into<String>) -> Result<(), WorkerError> {
        let prompt = prompt.into();
        {
            let mut guard = self.inner.lock().await;
            if guard.state != WorkerState::Ready {
                return Err(WorkerError::WrongState(guard.state));
            }
            guard.transition(WorkerState::Running);
        }

        let backend = self.backend.clone();
        let inner = self.inner.clone();
        let provider = self.provider.clone();
        let retention_window = self.retention_window;

        let handle = tokio::spawn(async move {
            run_send(backend, inner, provider, retention_window, prompt).await;
        });

        self.inner.lock().await.send_task = Some(handle);
        Ok(())
    }

    /// Non-blocking snapshot (spec §4.4 `poll`).
    pub async fn poll(&self) -> WorkerSnapshot {
        let guard = self.inner.lock().await;
        WorkerSnapshot {
            id: self.id,
            task_id: self.task_id.clone(),
            provider: self.provider.name.clone(),
            method: self.method,
            state: guard.state,
            created_at: guard.created_at,
            started_at: guard.started_at,
            ended_at: guard.ended_at,
            output_len: guard.output.len(),
            events_len: guard.events.len(),
            output_truncated: guard.output_truncated,
            usage: guard.usage,
            cost_usd: guard.cost_usd,
            error: guard.error,
        }
    }

    /// Returns the bytes appended after `since` plus a new cursor (spec
    /// §4.4 `read_output`). Never blocks; `since >= len` returns empty.
    pub async fn read_output(&self, since: usize) -> (Vec<u8>, usize) {
        let guard = self.inner.lock().await;
        let since = since.min(guard.output.len());
        (guard.output[since..].to_vec(), guard.output.len())
    }

    pub async fn tool_calls(&self) -> Vec<ToolCall> {
        self.inner.lock().await.tool_calls.clone()
    }

    pub async fn retained_until(&self) -> Option<Instant> {
        self.inner.lock().await.retained_until
    }

    /// Cancels the worker (spec §4.4 `cancel`). Idempotent: once terminal,
    /// later calls return `Ok(())` as a no-op (spec §8 boundary 7).
    pub async fn cancel(&self, _reason: Option<&str>) -> Result<(), WorkerError> {
        let mut guard = self.inner.lock().await;
        if guard.state.is_terminal() {
            return Ok(());
        }
        if !matches!(
            guard.state,
            WorkerState::Initializing | WorkerState::Ready | WorkerState::Running
        ) {
            return Err(WorkerError::WrongState(guard.state));
        }
        guard.transition(WorkerState::Cancelling);
        let send_task = guard.send_task.take();
        drop(guard);

        // Abort the in-flight send task for every backend, ACP included: an
        // un-aborted ACP send task can still reach its own `finish()` call
        // after this one, racing the state this function is about to commit.
        if let Some(handle) = send_task {
            handle.abort();
        }

        if let Backend::Acp { client, session_id } = &*self.backend {
            if let Some(sid) = session_id.lock().await.as_deref() {
                if let Err(err) = client.cancel(sid) {
                    warn!(error = %err, "best-effort ACP session/cancel failed");
                }
            }
        }

        let mut guard = self.inner.lock().await;
        guard.finish(self.retention_window, Some(ErrorKind::Cancelled), WorkerState::Failed);
        Ok(())
    }
}

async fn run_send(
    backend: Arc<Backend>,
    inner: Arc<AsyncMutex<Inner>>,
    provider: Provider,
    retention_window: Duration,
    prompt: String,
) {
    let outcome = match &*backend {
        Backend::Acp { client, session_id } => run_acp_send(client, session_id, &prompt).await,
        Backend::Cli { client, model_id } => run_cli_send(client, model_id, &prompt).await,
        Backend::Api { client, model_id, wire_shape } => {
            run_api_send(client, model_id, *wire_shape, &prompt).await
        }
    };

    let mut guard = inner.lock().await;
    match outcome {
        Ok(SendOutcome { text, usage }) => {
            guard.append_output(text.as_bytes());
            guard.usage.add(usage);
            guard.cost_usd = compute_cost_usd(
                guard.usage.tokens_in,
                guard.usage.tokens_out,
                provider.cost_per_input_token,
                provider.cost_per_output_token,
            );
            guard.finish(retention_window, None, WorkerState::Completed);
        }
        Err(kind) => {
            guard.finish(retention_window, Some(kind), WorkerState::Failed);
        }
    }
}

async fn run_acp_send(
    client: &AcpClient,
    session_id: &AsyncMutex<Option<String>>,
    prompt: &str,
) -> Result<SendOutcome, ErrorKind> {
    let sid = match session_id.lock().await.clone() {
        Some(sid) => sid,
        None => return Err(ErrorKind::WrongState),
    };
    let params = PromptParams {
        session_id: sid,
        prompt: vec![serde_json::json!({ "type": "text", "text": prompt })],
    };
    match client.prompt(params, Duration::from_secs(300)).await {
        Ok(result) => Ok(SendOutcome {
            text: String::new(),
            usage: extract_acp_usage(&result),
        }),
        Err(err) => Err(err.kind()),
    }
}

fn extract_acp_usage(result: &Value) -> Usage {
    let tokens_in = result.get("usage").and_then(|u| u.get("input_tokens")).and_then(Value::as_u64).unwrap_or(0);
    let tokens_out = result.get("usage").and_then(|u| u.get("output_tokens")).and_then(Value::as_u64).unwrap_or(0);
    Usage { tokens_in, tokens_out }
}

async fn run_cli_send(client: &CliClient, model_id: &str, prompt: &str) -> Result<SendOutcome, ErrorKind> {
    let args = vec![
        "run".to_string(),
        "--model".to_string(),
        model_id.to_string(),
        "--prompt".to_string(),
        prompt.to_string(),
    ];
    match client.invoke(&args, None).await {
        Ok(output) if output.status.success() => Ok(SendOutcome {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            usage: Usage::default(),
        }),
        Ok(_) => Err(ErrorKind::CliError),
        Err(err) => Err(err.kind()),
    }
}

async fn run_api_send(
    client: &ApiClient,
    model_id: &str,
    wire_shape: WireShape,
    prompt: &str,
) -> Result<SendOutcome, ErrorKind> {
    let body = match wire_shape {
        WireShape::AnthropicMessages => serde_json::json!({
            "model": model_id,
            "max_tokens": 4096,
            "stream": true,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        WireShape::OpenAiCompat => serde_json::json!({
            "model": model_id,
            "stream": true,
            "messages": [{ "role": "user", "content": prompt }],
        }),
    };
    match client.stream(body).await {
        Ok(result) => Ok(SendOutcome { text: result.text, usage: result.usage }),
        Err(err) => Err(err.kind()),
    }
}

fn spawn_acp_update_listener(backend: Arc<Backend>, inner: Arc<AsyncMutex<Inner>>) {
    tokio::spawn(async move {
        let Backend::Acp { client, .. } = &*backend else { return };
        let mut updates = client.updates().await;
        while let Some(update) = updates.recv().await {
            record_session_update(&inner, update).await;
        }
    });
}

async fn record_session_update(inner: &AsyncMutex<Inner>, update: orc_acp::SessionUpdate) {
    let mut guard = inner.lock().await;
    match update {
        orc_acp::SessionUpdate::AgentMessageChunk { content, .. } => {
            if let Some(text) = content.get("text").and_then(Value::as_str) {
                guard.append_output(text.as_bytes());
            }
            guard.events.push(WorkerEvent::new("agent_message_chunk", content));
        }
        orc_acp::SessionUpdate::ToolCall { call, .. } => {
            guard.events.push(WorkerEvent::new("tool_call", call));
        }
        orc_acp::SessionUpdate::ToolCallUpdate { update, .. } => {
            guard.events.push(WorkerEvent::new("tool_call_update", update));
        }
        orc_acp::SessionUpdate::Plan { entries, .. } => {
            guard.events.push(WorkerEvent::new("plan", entries));
        }
        orc_acp::SessionUpdate::Raw { method, params } => {
            guard.events.push(WorkerEvent::new(method, params));
        }
    }
}

/// Wraps an application-supplied [`FsHandler`], recording a `tool_calls`
/// entry every time the backend actually invokes a callback (spec §4.4
/// "Observable side effects"; spec §8 scenario S4).
struct RecordingFs {
    inner: Arc<AsyncMutex<Inner>>,
    delegate: Box<dyn FsHandler>,
}

#[async_trait::async_trait]
impl FsHandler for RecordingFs {
    async fn read_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let result = self.delegate.read_text_file(params.clone()).await;
        record_fs_call(&self.inner, &params, ToolOp::Read).await;
        result
    }

    async fn write_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let result = self.delegate.write_text_file(params.clone()).await;
        record_fs_call(&self.inner, &params, ToolOp::Write).await;
        result
    }
}

struct RecordingTerminal {
    inner: Arc<AsyncMutex<Inner>>,
    delegate: Box<dyn TerminalHandler>,
}

#[async_trait::async_trait]
impl TerminalHandler for RecordingTerminal {
    async fn create(&self, params: Value) -> Result<Value, (i64, String)> {
        let result = self.delegate.create(params.clone()).await;
        record_fs_call(&self.inner, &params, ToolOp::Edit).await;
        result
    }

    async fn output(&self, params: Value) -> Result<Value, (i64, String)> {
        self.delegate.output(params).await
    }

    async fn kill(&self, params: Value) -> Result<Value, (i64, String)> {
        self.delegate.kill(params).await
    }
}

async fn record_fs_call(inner: &AsyncMutex<Inner>, params: &Value, op: ToolOp) {
    let Some(path) = params.get("path").and_then(Value::as_str) else {
        return;
    };
    let mut guard = inner.lock().await;
    guard.tool_calls.push(ToolCall {
        path: path.to_string(),
        op,
        at: Utc::now(),
    });
}
