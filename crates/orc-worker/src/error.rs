use orc_types::{ErrorKind, WorkerState};
use thiserror::Error;

/// Worker-level errors (spec §4.4). Transport errors already carry their own
/// `kind()`; this enum only adds the state-machine violation that no
/// transport can express on its own.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("operation is not valid in state {0:?}")]
    WrongState(WorkerState),
    #[error(transparent)]
    Acp(#[from] orc_acp::AcpError),
    #[error(transparent)]
    Cli(#[from] orc_cli::CliError),
    #[error(transparent)]
    Api(#[from] orc_api::ApiError),
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::WrongState(_) => ErrorKind::WrongState,
            WorkerError::Acp(e) => e.kind(),
            WorkerError::Cli(e) => e.kind(),
            WorkerError::Api(e) => e.kind(),
        }
    }
}
