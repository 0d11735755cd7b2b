use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use orc_acp::{AcpClient, Callbacks, FsHandler, NewSessionParams, StdioServerConfig};

struct RecordingFs;

#[async_trait]
impl FsHandler for RecordingFs {
    async fn read_text_file(&self, params: Value) -> Result<Value, (i64, String)> {
        let path = params.get("path").and_then(Value::as_str).unwrap_or_default();
        Ok(serde_json::json!({ "content": format!("contents-of-{path}") }))
    }
}

fn write_fake_acp_agent() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("fake-acp-agent");
    let script = r#"#!/usr/bin/env python3
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
        send({"jsonrpc": "2.0", "id": msg.get("id"), "result": {"protocol_version": 1}})
    elif method == "session/new":
        send({"jsonrpc": "2.0", "id": msg.get("id"), "result": {"session_id": "sess-1"}})
        # ask the client to read a file back as part of session setup
        send({"jsonrpc": "2.0", "id": 9001, "method": "fs/read_text_file", "params": {"path": "/tmp/notes.txt"}})
    elif method == "exit":
        break
"#;

    fs::write(&script_path, script).expect("write script");
    let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("chmod");
    (dir, script_path)
}

#[tokio::test]
async fn answers_server_initiated_fs_read_text_file() {
    let (_dir, script) = write_fake_acp_agent();
    let config = StdioServerConfig {
        startup_timeout: Duration::from_secs(5),
        ..StdioServerConfig::new(script)
    };
    let callbacks = Callbacks {
        fs: Box::new(RecordingFs),
        ..Callbacks::default()
    };

    let client = AcpClient::spawn(config, callbacks)
        .await
        .expect("spawn agent");

    let result = client.initialize(1).await.expect("initialize");
    assert_eq!(result["protocol_version"], 1);

    let session_id = client
        .new_session(
            NewSessionParams {
                cwd: "/tmp".to_string(),
                mcp_servers: Vec::new(),
            },
            Duration::from_secs(5),
        )
        .await
        .expect("new session");
    assert_eq!(session_id, "sess-1");

    // Give the fake agent's unsolicited fs/read_text_file request time to
    // round-trip through our callback dispatcher.
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn unknown_backend_binary_surfaces_spawn_error() {
    let config = StdioServerConfig::new("/nonexistent/definitely-not-a-binary");
    let err = AcpClient::spawn(config, Callbacks::default())
        .await
        .expect_err("spawn should fail");
    assert!(matches!(err, orc_acp::AcpError::Spawn { .. }));
}
