use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use orc_acp::{Callbacks, FsHandler, StdioServerConfig, TerminalHandler};
use orc_cli::CliClientBuilder;
use orc_types::{ErrorKind, Provider, ProviderKind, WorkerMethod, WorkerState};
use orc_worker::Worker;

struct NoopTerminal;
#[async_trait]
impl TerminalHandler for NoopTerminal {}

struct RecordingFs;
#[async_trait]
impl FsHandler for RecordingFs {
    async fn read_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let path = params.get("path").and_then(Value::as_str).unwrap_or_default();
        Ok(serde_json::json!({ "content": format!("contents-of-{path}") }))
    }
}

fn write_script(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("fake-backend");
    fs::write(&script_path, body).expect("write script");
    let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("chmod");
    (dir, script_path)
}

fn write_fake_acp_agent(prompt_behavior: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("fake-acp-agent");
    let script = format!(
        r#"#!/usr/bin/env python3
import json
import sys

def send(payload):
    sys.stdout.write(json.dumps(payload) + "\n")
    sys.stdout.flush()

for line in sys.stdin:
    if not line.strip():
        continue
    msg = json.loads(line)
    method = msg.get("method")
    if method == "initialize":
        send({{"jsonrpc": "2.0", "id": msg.get("id"), "result": {{"protocol_version": 1}}}})
    elif method == "session/new":
        send({{"jsonrpc": "2.0", "id": msg.get("id"), "result": {{"session_id": "sess-1"}}}})
        send({{"jsonrpc": "2.0", "id": 9001, "method": "fs/read_text_file", "params": {{"path": "/tmp/notes.txt"}}}})
    elif method == "session/prompt":
        {prompt_behavior}
"#
    );
    fs::write(&script_path, script).expect("write script");
    let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("chmod");
    (dir, script_path)
}

fn cli_provider() -> Provider {
    Provider {
        name: "fake-cli".to_string(),
        kind: ProviderKind::Cli,
        model_id: "fake-model".to_string(),
        context_window: 8192,
        cost_per_input_token: 0.0,
        cost_per_output_token: 0.0,
        max_concurrency: 1,
        endpoint: None,
        config_path: None,
        tags: vec![],
    }
}

fn acp_provider() -> Provider {
    Provider {
        name: "fake-acp".to_string(),
        kind: ProviderKind::Acp,
        model_id: "fake-agent".to_string(),
        context_window: 8192,
        cost_per_input_token: 0.0,
        cost_per_output_token: 0.0,
        max_concurrency: 1,
        endpoint: None,
        config_path: None,
        tags: vec![],
    }
}

async fn wait_until_terminal(worker: &Worker) -> orc_types::WorkerSnapshot {
    for _ in 0..200 {
        let snapshot = worker.poll().await;
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("worker never reached a terminal state");
}

#[tokio::test]
async fn cli_worker_completes_and_output_is_readable_in_full_then_empty() {
    let (_dir, script) = write_script("#!/bin/sh\necho fake-backend-reply\nexit 0\n");
    let builder = CliClientBuilder::default().binary(script);
    let worker = Worker::start_cli("task-1", cli_provider(), builder, Duration::from_secs(3600))
        .await
        .expect("cli worker starts");

    assert_eq!(worker.poll().await.state, WorkerState::Ready);

    worker.send("do the thing").await.expect("send accepted while ready");
    let snapshot = wait_until_terminal(&worker).await;

    assert_eq!(snapshot.state, WorkerState::Completed);
    assert!(snapshot.error.is_none());

    let (bytes, cursor) = worker.read_output(0).await;
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "fake-backend-reply");
    assert_eq!(cursor, snapshot.output_len);

    // Reading from the current cursor (or beyond it) yields nothing new.
    let (more, same_cursor) = worker.read_output(cursor).await;
    assert!(more.is_empty());
    assert_eq!(same_cursor, cursor);

    let (past_end, clamped_cursor) = worker.read_output(cursor + 1000).await;
    assert!(past_end.is_empty());
    assert_eq!(clamped_cursor, cursor);
}

#[tokio::test]
async fn cli_worker_deadline_elapsed_kills_process_and_reports_timeout() {
    let (_dir, script) = write_script("#!/bin/sh\nsleep 30\n");
    let builder = CliClientBuilder::default()
        .binary(script)
        .timeout(Some(Duration::from_millis(100)))
        .kill_grace(Duration::from_millis(50));
    let worker = Worker::start_cli("task-timeout", cli_provider(), builder, Duration::from_secs(3600))
        .await
        .expect("cli worker starts");

    worker.send("never answers").await.expect("send accepted while ready");

    let started = std::time::Instant::now();
    let snapshot = wait_until_terminal(&worker).await;
    assert_eq!(snapshot.state, WorkerState::Failed);
    assert_eq!(snapshot.error, Some(ErrorKind::Timeout));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancel_is_idempotent_once_terminal() {
    let (_dir, script) = write_script("#!/bin/sh\necho done\nexit 0\n");
    let builder = CliClientBuilder::default().binary(script);
    let worker = Worker::start_cli("task-cancel", cli_provider(), builder, Duration::from_secs(3600))
        .await
        .expect("cli worker starts");

    worker.send("do it").await.expect("send accepted while ready");
    wait_until_terminal(&worker).await;

    worker.cancel(Some("no longer needed")).await.expect("cancel on terminal worker is a no-op");
    worker.cancel(Some("again")).await.expect("cancel remains a no-op");
    assert_eq!(worker.poll().await.state, WorkerState::Completed);
}

#[tokio::test]
async fn cancel_before_completion_transitions_to_failed_cancelled() {
    let (_dir, script) = write_script("#!/bin/sh\nsleep 30\n");
    let builder = CliClientBuilder::default().binary(script);
    let worker = Worker::start_cli("task-live-cancel", cli_provider(), builder, Duration::from_secs(3600))
        .await
        .expect("cli worker starts");

    worker.send("slow task").await.expect("send accepted while ready");
    tokio::time::sleep(Duration::from_millis(50)).await;

    worker.cancel(Some("user requested")).await.expect("cancel while running");
    let snapshot = worker.poll().await;
    assert_eq!(snapshot.state, WorkerState::Failed);
    assert_eq!(snapshot.error, Some(ErrorKind::Cancelled));
}

#[tokio::test]
async fn acp_worker_records_tool_call_issued_during_session_setup() {
    let (_dir, script) = write_fake_acp_agent("pass");
    let config = StdioServerConfig {
        startup_timeout: Duration::from_secs(5),
        ..StdioServerConfig::new(script)
    };

    let worker = Worker::start_acp(
        "task-acp",
        acp_provider(),
        config,
        Box::new(RecordingFs),
        Box::new(NoopTerminal),
        "/tmp",
        Duration::from_secs(5),
        Duration::from_secs(3600),
    )
    .await
    .expect("acp worker starts");

    assert_eq!(worker.method(), WorkerMethod::Acp);
    assert_eq!(worker.poll().await.state, WorkerState::Ready);

    // The fake agent issues its fs/read_text_file request as soon as
    // session/new responds; give the callback dispatcher time to run.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let calls = worker.tool_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/tmp/notes.txt");
}

#[tokio::test]
async fn acp_worker_prompt_fails_with_backend_gone_when_agent_exits_mid_prompt() {
    let (_dir, script) = write_fake_acp_agent("sys.exit(0)");
    let config = StdioServerConfig {
        startup_timeout: Duration::from_secs(5),
        ..StdioServerConfig::new(script)
    };

    let worker = Worker::start_acp(
        "task-acp-gone",
        acp_provider(),
        config,
        Box::new(RecordingFs),
        Box::new(NoopTerminal),
        "/tmp",
        Duration::from_secs(5),
        Duration::from_secs(3600),
    )
    .await
    .expect("acp worker starts");

    worker.send("will never get an answer").await.expect("send accepted while ready");
    let snapshot = wait_until_terminal(&worker).await;

    assert_eq!(snapshot.state, WorkerState::Failed);
    assert_eq!(snapshot.error, Some(ErrorKind::BackendGone));
}
