use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use orc_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("backend binary `{0}` not found")]
    MissingBinary(PathBuf),
    #[error("failed to spawn process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("process timed out after {timeout:?} and was killed")]
    Timeout { timeout: Duration },
    #[error("failed waiting for process: {0}")]
    Wait(std::io::Error),
    #[error("failed reading stdout: {0}")]
    StdoutRead(std::io::Error),
    #[error("failed reading stderr: {0}")]
    StderrRead(std::io::Error),
    #[error("failed writing stdin: {0}")]
    StdinWrite(std::io::Error),
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("internal error: missing stderr pipe")]
    MissingStderr,
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("process exited with non-zero status: {status}")]
    NonZeroExit {
        status: ExitStatus,
        stderr: String,
    },
    #[error("failed to parse process output as JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::MissingBinary(_) | CliError::Spawn { .. } => ErrorKind::BackendMissing,
            CliError::Timeout { .. } => ErrorKind::Timeout,
            CliError::NonZeroExit { .. } | CliError::JsonParse(_) => ErrorKind::CliError,
            CliError::Wait(_)
            | CliError::StdoutRead(_)
            | CliError::StderrRead(_)
            | CliError::StdinWrite(_)
            | CliError::MissingStdout
            | CliError::MissingStderr
            | CliError::Join(_) => ErrorKind::CliError,
        }
    }
}
