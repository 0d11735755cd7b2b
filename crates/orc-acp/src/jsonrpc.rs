use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::error::AcpError;
use crate::handlers::Callbacks;
use crate::protocol::{
    InboundRequest, RequestId, SessionUpdate, ERR_CANCELLED, ERR_METHOD_NOT_FOUND,
    METHOD_FS_READ_TEXT_FILE, METHOD_FS_WRITE_TEXT_FILE, METHOD_SESSION_REQUEST_PERMISSION,
    METHOD_SESSION_UPDATE, METHOD_TERMINAL_CREATE, METHOD_TERMINAL_KILL, METHOD_TERMINAL_OUTPUT,
};

pub type EventStream = mpsc::UnboundedReceiver<SessionUpdate>;
type PendingRequests = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, AcpError>>>>>;
type UpdateSinks = Arc<Mutex<Vec<mpsc::UnboundedSender<SessionUpdate>>>>;

#[derive(Debug, Clone)]
pub struct StdioServerConfig {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub mirror_stdio: bool,
}

impl StdioServerConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            startup_timeout: Duration::from_secs(30),
            mirror_stdio: false,
        }
    }
}

/// Stdio JSON-RPC transport to an ACP backend child process.
///
/// Grounded directly on `codex/src/mcp/jsonrpc.rs::JsonRpcTransport`: a
/// writer task draining an `mpsc::UnboundedSender<String>` into child
/// stdin, a reader task parsing newline-delimited JSON off child stdout, a
/// `PendingRequests` correlation table, and a notification fan-out. Extends
/// that shape with an inbound dispatcher for server-initiated `fs/*`,
/// `terminal/*`, and `session/request_permission` calls, which
/// `codex`'s client-only MCP surface never needed.
pub struct JsonRpcTransport {
    writer: mpsc::UnboundedSender<String>,
    pending: PendingRequests,
    update_sinks: UpdateSinks,
    next_id: AtomicU64,
    tasks: Vec<JoinHandle<()>>,
    child: Arc<Mutex<Option<Child>>>,
    startup_timeout: Duration,
}

impl JsonRpcTransport {
    pub async fn spawn(config: StdioServerConfig, callbacks: Callbacks) -> Result<Self, AcpError> {
        let mut command = Command::new(&config.binary);
        command
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let command_debug = format!("{command:?}");
        let mut backoff = Duration::from_millis(2);
        let mut child = None;
        for attempt in 0..5 {
            match command.spawn() {
                Ok(spawned) => {
                    child = Some(spawned);
                    break;
                }
                Err(source) => {
                    let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                        || source.raw_os_error() == Some(26);
                    if is_busy && attempt < 4 {
                        tokio::time::sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                        continue;
                    }
                    return Err(AcpError::Spawn {
                        command: command_debug,
                        source,
                    });
                }
            }
        }
        let mut child = child.expect("spawn loop should return or set child");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcpError::Transport("child stdout unavailable".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AcpError::Transport("child stdin unavailable".into()))?;
        let stderr = child.stderr.take();

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let update_sinks: UpdateSinks = Arc::new(Mutex::new(Vec::new()));
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let writer_handle = tokio::spawn(writer_task(stdin, writer_rx));
        let reader_handle = tokio::spawn(reader_task(
            stdout,
            pending.clone(),
            update_sinks.clone(),
            writer_tx.clone(),
            callbacks,
            config.mirror_stdio,
        ));
        let stderr_handle = stderr.map(|s| tokio::spawn(stderr_task(s, config.mirror_stdio)));

        let mut tasks = vec![writer_handle, reader_handle];
        if let Some(handle) = stderr_handle {
            tasks.push(handle);
        }

        Ok(Self {
            writer: writer_tx,
            pending,
            update_sinks,
            next_id: AtomicU64::new(1),
            tasks,
            child: Arc::new(Mutex::new(Some(child))),
            startup_timeout: config.startup_timeout,
        })
    }

    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, AcpError> {
        let (_, rx) = self.request(method, params).await?;
        recv_with_timeout(rx, timeout).await
    }

    pub async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(RequestId, oneshot::Receiver<Result<Value, AcpError>>), AcpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let serialized = serde_json::to_string(&message)?;
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = self.pending.lock().await;
            guard.insert(id, tx);
        }

        if self.writer.send(serialized).is_err() {
            let mut guard = self.pending.lock().await;
            guard.remove(&id);
            return Err(AcpError::ChannelClosed);
        }

        Ok((id, rx))
    }

    pub fn notify(&self, method: &str, params: Value) -> Result<(), AcpError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let serialized = serde_json::to_string(&message)?;
        self.writer
            .send(serialized)
            .map_err(|_| AcpError::ChannelClosed)
    }

    pub async fn register_update_listener(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.update_sinks.lock().await;
        guard.push(tx);
        rx
    }

    pub fn cancel(&self, session_id: &str) -> Result<(), AcpError> {
        self.notify(
            crate::protocol::METHOD_SESSION_CANCEL,
            serde_json::json!({ "session_id": session_id }),
        )
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }
}

impl Drop for JsonRpcTransport {
    fn drop(&mut self) {
        for handle in &self.tasks {
            handle.abort();
        }
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.start_kill();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Value,
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

async fn writer_task(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(message) = rx.recv().await {
        if stdin.write_all(message.as_bytes()).await.is_err() {
            break;
        }
        if stdin.write_all(b"\n").await.is_err() {
            break;
        }
        let _ = stdin.flush().await;
    }
    let _ = stdin.shutdown().await;
}

async fn reader_task(
    stdout: ChildStdout,
    pending: PendingRequests,
    update_sinks: UpdateSinks,
    writer: mpsc::UnboundedSender<String>,
    callbacks: Callbacks,
    mirror_stdio: bool,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if mirror_stdio {
            eprintln!("[acp stdout] {line}");
        }
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                warn!("failed to parse ACP stdout as JSON: {err}");
                continue;
            }
        };

        let has_id = value.get("id").is_some();
        let has_method = value.get("method").is_some();

        if has_id && has_method {
            let Some(req) = decode_inbound_request(value) else {
                warn!("received malformed inbound ACP request");
                continue;
            };
            dispatch_inbound(req, &callbacks, &writer).await;
        } else if has_id {
            let Ok(response) = serde_json::from_value::<RpcResponse>(value) else {
                warn!("received malformed ACP response");
                continue;
            };
            handle_response(response, &pending).await;
        } else if has_method {
            let method = value.get("method").and_then(Value::as_str).unwrap_or_default();
            let params = value.get("params").cloned().unwrap_or(Value::Null);
            if method == METHOD_SESSION_UPDATE {
                let update = parse_session_update(params);
                broadcast_update(update, &update_sinks).await;
            }
        } else {
            warn!("received malformed ACP message");
        }
    }

    let mut guard = pending.lock().await;
    for (_, tx) in guard.drain() {
        let _ = tx.send(Err(AcpError::ChannelClosed));
    }
}

async fn stderr_task(stderr: ChildStderr, mirror_stdio: bool) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if mirror_stdio {
            eprintln!("[acp stderr] {line}");
        } else {
            debug!("acp stderr: {line}");
        }
    }
}

fn decode_inbound_request(value: Value) -> Option<InboundRequest> {
    let id = value.get("id")?.as_u64()?;
    let method = value.get("method")?.as_str()?.to_string();
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    Some(InboundRequest { id, method, params })
}

async fn dispatch_inbound(
    req: InboundRequest,
    callbacks: &Callbacks,
    writer: &mpsc::UnboundedSender<String>,
) {
    let result = match req.method.as_str() {
        METHOD_FS_READ_TEXT_FILE => callbacks.fs.read_text_file(req.params).await,
        METHOD_FS_WRITE_TEXT_FILE => callbacks.fs.write_text_file(req.params).await,
        METHOD_TERMINAL_CREATE => callbacks.terminal.create(req.params).await,
        METHOD_TERMINAL_OUTPUT => callbacks.terminal.output(req.params).await,
        METHOD_TERMINAL_KILL => callbacks.terminal.kill(req.params).await,
        METHOD_SESSION_REQUEST_PERMISSION => {
            callbacks.permission.request_permission(req.params).await
        }
        other => Err((
            ERR_METHOD_NOT_FOUND,
            format!("unsupported inbound method `{other}`"),
        )),
    };

    let message = match result {
        Ok(value) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "result": value,
        }),
        Err((code, message)) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "error": { "code": code, "message": message },
        }),
    };

    if let Ok(serialized) = serde_json::to_string(&message) {
        let _ = writer.send(serialized);
    }
}

async fn handle_response(response: RpcResponse, pending: &PendingRequests) {
    let Some(id) = response.id.as_u64() else {
        warn!("received response without numeric id");
        return;
    };

    let sender = { pending.lock().await.remove(&id) };
    let Some(tx) = sender else {
        return;
    };

    if let Some(err) = response.error {
        let mapped = if err.code == ERR_CANCELLED {
            AcpError::Cancelled
        } else {
            AcpError::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            }
        };
        let _ = tx.send(Err(mapped));
    } else if let Some(result) = response.result {
        let _ = tx.send(Ok(result));
    } else {
        let _ = tx.send(Err(AcpError::Transport(
            "response missing result and error".into(),
        )));
    }
}

fn parse_session_update(params: Value) -> SessionUpdate {
    serde_json::from_value(params.clone()).unwrap_or(SessionUpdate::Raw {
        method: METHOD_SESSION_UPDATE.to_string(),
        params,
    })
}

async fn broadcast_update(event: SessionUpdate, sinks: &UpdateSinks) {
    let mut guard = sinks.lock().await;
    guard.retain(|tx| tx.send(event.clone()).is_ok());
}

async fn recv_with_timeout(
    rx: oneshot::Receiver<Result<Value, AcpError>>,
    timeout: Duration,
) -> Result<Value, AcpError> {
    match time::timeout(timeout, rx).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(err),
        Ok(Err(_)) => Err(AcpError::ChannelClosed),
        Err(_) => Err(AcpError::Timeout(timeout)),
    }
}
