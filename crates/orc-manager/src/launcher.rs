use std::time::Duration;

use async_trait::async_trait;
use orc_types::{Provider, TaskSpec, WorkerMethod};
use orc_worker::{Worker, WorkerError};

/// Deployment-specific construction of a [`Worker`] for a routed
/// `(provider, method)` pair (spec §4.8 `spawn`).
///
/// The manager deliberately does not know how to build an `AcpClient`, a
/// `CliClientBuilder`, or an `ApiClient` from a bare [`Provider`] record —
/// that needs filesystem/terminal callback wiring, bearer tokens, and
/// process-spawn arguments the catalog doesn't carry. The master
/// orchestrator supplies that wiring by implementing this trait once per
/// deployment.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    async fn launch(
        &self,
        task: &TaskSpec,
        provider: &Provider,
        method: WorkerMethod,
        retention_window: Duration,
    ) -> Result<Worker, WorkerError>;
}
