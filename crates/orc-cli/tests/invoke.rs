use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use orc_cli::{CliClient, CliError};

fn write_script(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("fake-backend");
    std::fs::write(&script_path, body).expect("write script");
    let mut perms = std::fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script_path, perms).expect("chmod");
    (dir, script_path)
}

#[tokio::test]
async fn captures_stdout_and_exit_status() {
    let (_dir, script) = write_script("#!/bin/sh\necho hello-from-backend\nexit 0\n");
    let client = CliClient::builder().binary(script).build().unwrap();

    let output = client.invoke(&[], None).await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello-from-backend");
}

#[tokio::test]
async fn missing_binary_is_backend_missing() {
    let client = CliClient::builder()
        .binary("/definitely/not/a/real/binary")
        .build()
        .unwrap();

    let err = client.invoke(&[], None).await.unwrap_err();
    assert!(matches!(err, CliError::MissingBinary(_)));
}

#[tokio::test]
async fn deadline_elapsed_kills_process_group() {
    let (_dir, script) = write_script("#!/bin/sh\nsleep 30\n");
    let client = CliClient::builder()
        .binary(script)
        .timeout(Some(Duration::from_millis(100)))
        .kill_grace(Duration::from_millis(50))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let err = client.invoke(&[], None).await.unwrap_err();
    assert!(matches!(err, CliError::Timeout { .. }));
    // The sleeping child must have been killed well before its own 30s sleep
    // would have elapsed.
    assert!(started.elapsed() < Duration::from_secs(5));
}
