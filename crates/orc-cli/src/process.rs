use std::collections::BTreeMap;
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::{task, time};

use crate::error::CliError;

#[derive(Clone, Copy)]
pub(crate) enum ConsoleTarget {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Reads `reader` to completion into a buffer, optionally mirroring each
/// chunk to the console. Grounded on
/// `claude_code/src/process.rs::tee_stream`.
pub(crate) async fn tee_stream<R>(
    mut reader: R,
    target: ConsoleTarget,
    mirror_console: bool,
) -> Result<Vec<u8>, io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if mirror_console {
            task::block_in_place(|| match target {
                ConsoleTarget::Stdout => {
                    let mut out = io::stdout();
                    out.write_all(&chunk[..n])?;
                    out.flush()
                }
                ConsoleTarget::Stderr => {
                    let mut out = io::stderr();
                    out.write_all(&chunk[..n])?;
                    out.flush()
                }
            })?;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    Ok(buffer)
}

/// Spawns `command`, retrying on `ExecutableFileBusy`/errno 26 with capped
/// exponential backoff. Grounded on
/// `claude_code/src/process.rs::spawn_with_retry` /
/// `codex/src/mcp/jsonrpc.rs`'s identical busy-loop.
pub(crate) fn spawn_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<tokio::process::Child, CliError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                if source.kind() == std::io::ErrorKind::NotFound {
                    return Err(CliError::MissingBinary(binary.to_path_buf()));
                }
                return Err(CliError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}

/// Runs `command` to completion, optionally bounded by `timeout`. On
/// timeout the whole process group is killed (`SIGTERM`, then `SIGKILL`
/// after `kill_grace`) rather than just the direct child, since CLI
/// backends commonly fork helper processes a plain single-child
/// `kill_on_drop` never has to account for.
pub(crate) async fn run_command(
    mut command: Command,
    binary: &Path,
    stdin_bytes: Option<&[u8]>,
    timeout: Option<Duration>,
    kill_grace: Duration,
    mirror_stdout: bool,
    mirror_stderr: bool,
) -> Result<CommandOutput, CliError> {
    command.stdin(if stdin_bytes.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());
    command.process_group(0);
    // Covers the case where the awaiting task itself is dropped (e.g. a
    // cancelled worker aborting its send future) rather than timing out
    // through the branch below, which kills the whole group explicitly.
    command.kill_on_drop(true);

    let mut child = spawn_with_retry(&mut command, binary)?;
    let pid = child.id();

    if let Some(bytes) = stdin_bytes {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes).await.map_err(CliError::StdinWrite)?;
        }
    }

    let stdout = child.stdout.take().ok_or(CliError::MissingStdout)?;
    let stderr = child.stderr.take().ok_or(CliError::MissingStderr)?;

    let stdout_task = tokio::spawn(tee_stream(stdout, ConsoleTarget::Stdout, mirror_stdout));
    let stderr_task = tokio::spawn(tee_stream(stderr, ConsoleTarget::Stderr, mirror_stderr));

    let wait_fut = child.wait();
    let status = match timeout {
        Some(dur) => match time::timeout(dur, wait_fut).await {
            Ok(result) => result.map_err(CliError::Wait)?,
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid, kill_grace).await;
                }
                let _ = child.wait().await;
                return Err(CliError::Timeout { timeout: dur });
            }
        },
        None => wait_fut.await.map_err(CliError::Wait)?,
    };

    let stdout = stdout_task
        .await
        .map_err(|e| CliError::Join(e.to_string()))?
        .map_err(CliError::StdoutRead)?;
    let stderr = stderr_task
        .await
        .map_err(|e| CliError::Join(e.to_string()))?
        .map_err(CliError::StderrRead)?;

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Sends `SIGTERM` to the process group, waits `grace`, then escalates to
/// `SIGKILL`. `process_group(0)` (set at spawn time) makes the child the
/// leader of its own group, so this reaches any subprocesses it forked too.
async fn kill_process_group(pid: u32, grace: Duration) {
    let pgid = Pid::from_raw(pid as i32);
    let _ = signal::killpg(pgid, Signal::SIGTERM);
    time::sleep(grace).await;
    let _ = signal::killpg(pgid, Signal::SIGKILL);
}

pub(crate) fn apply_env(command: &mut Command, env: &BTreeMap<String, String>) {
    for (k, v) in env {
        command.env(k, v);
    }
}
