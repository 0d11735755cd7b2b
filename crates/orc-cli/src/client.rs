use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

use crate::error::CliError;
use crate::process::{self, apply_env, CommandOutput};

/// Builder for [`CliClient`], mirroring the builder-then-build shape
/// `ClaudeClientBuilder`/`CodexClientBuilder` use.
#[derive(Debug, Clone)]
pub struct CliClientBuilder {
    binary: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    kill_grace: Duration,
    mirror_stdout: bool,
    mirror_stderr: bool,
}

impl Default for CliClientBuilder {
    fn default() -> Self {
        Self {
            binary: None,
            working_dir: None,
            env: BTreeMap::new(),
            timeout: Some(Duration::from_secs(120)),
            kill_grace: Duration::from_secs(5),
            mirror_stdout: false,
            mirror_stderr: false,
        }
    }
}

impl CliClientBuilder {
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn mirror_stdout(mut self, enabled: bool) -> Self {
        self.mirror_stdout = enabled;
        self
    }

    pub fn mirror_stderr(mut self, enabled: bool) -> Self {
        self.mirror_stderr = enabled;
        self
    }

    pub fn build(self) -> Result<CliClient, CliError> {
        let binary = self.binary.ok_or(CliError::MissingBinary(PathBuf::new()))?;
        Ok(CliClient {
            binary,
            working_dir: self.working_dir,
            env: self.env,
            timeout: self.timeout,
            kill_grace: self.kill_grace,
            mirror_stdout: self.mirror_stdout,
            mirror_stderr: self.mirror_stderr,
        })
    }
}

/// One-shot subprocess invocation of a CLI-shaped backend (spec §4.2).
///
/// Grounded on `claude_code/src/process.rs::run_command`: spawn-with-retry,
/// stdin write, tee'd stdout/stderr, `time::timeout` around `child.wait()`.
/// Adds process-group kill-on-timeout, which a plain single-child
/// `kill_on_drop` never needed.
pub struct CliClient {
    binary: PathBuf,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    kill_grace: Duration,
    mirror_stdout: bool,
    mirror_stderr: bool,
}

impl CliClient {
    pub fn builder() -> CliClientBuilder {
        CliClientBuilder::default()
    }

    /// Runs the backend once with `args`, optionally feeding `stdin_bytes`.
    pub async fn invoke(
        &self,
        args: &[String],
        stdin_bytes: Option<&[u8]>,
    ) -> Result<CommandOutput, CliError> {
        let mut command = Command::new(&self.binary);
        command.args(args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        apply_env(&mut command, &self.env);

        process::run_command(
            command,
            &self.binary,
            stdin_bytes,
            self.timeout,
            self.kill_grace,
            self.mirror_stdout,
            self.mirror_stderr,
        )
        .await
    }
}
