use orc_types::{ErrorKind, WorkerId};
use thiserror::Error;

/// Manager-level errors (spec §4.8). Routing, admission, and worker errors
/// are wrapped rather than re-derived; `NotFound` is added here because it
/// has no counterpart in the shared transport error taxonomy (spec §7) — a
/// worker past its retention window, or one that was never spawned, is a
/// lookup miss against the manager's own table, not a backend failure.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no provider satisfies the task's context window and budget gates")]
    NoProvider,
    #[error("worker {0} was never spawned, or has aged out of its retention window")]
    NotFound(WorkerId),
    #[error(transparent)]
    Pool(#[from] orc_pool::PoolError),
    #[error(transparent)]
    Worker(#[from] orc_worker::WorkerError),
}

impl ManagerError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ManagerError::NoProvider => Some(ErrorKind::NoProvider),
            ManagerError::NotFound(_) => None,
            ManagerError::Pool(e) => Some(e.kind()),
            ManagerError::Worker(e) => Some(e.kind()),
        }
    }
}
