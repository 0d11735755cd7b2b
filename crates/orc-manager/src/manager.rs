use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use orc_aggregator::{ExecutionGroup, ExecutionSummary, MemberResult};
use orc_config::RoutingConfig;
use orc_pool::{BackpressurePolicy, Pool, PoolPermit};
use orc_router::{BudgetState, Recommendation};
use orc_types::{Provider, ProviderCatalog, TaskSpec, WorkerId, WorkerMethod, WorkerSnapshot, WorkerState};
use orc_worker::Worker;
use parking_lot::Mutex;

use crate::error::ManagerError;
use crate::launcher::BackendLauncher;

/// Default retention window for finished workers (spec §6 "defaults").
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(3600);

const SUPERVISOR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A filter applied by [`Manager::list`] (spec §4.8 `list(filter)`). All
/// fields are conjunctive; `None` means "don't filter on this dimension".
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<WorkerState>,
    pub provider: Option<String>,
    pub task_id: Option<String>,
}

struct ManagedWorker {
    worker: Arc<Worker>,
    task_id: String,
    provider: String,
    // Taken (dropped) by the supervisor task once the worker reaches a
    // terminal state, releasing the pool slot back to waiting admissions.
    permit: Option<PoolPermit>,
}

/// Thin facade over [`orc_router`], [`orc_pool`], [`orc_worker`], and
/// [`orc_aggregator`] (spec §4.8). Holds no lock across an `.await` for
/// longer than a single table lookup; every other wait (pool admission,
/// worker completion) happens outside the `workers` lock.
pub struct Manager {
    catalog: ProviderCatalog,
    routing: RoutingConfig,
    pool: Arc<Pool>,
    launcher: Arc<dyn BackendLauncher>,
    retention_window: Duration,
    total_budget_usd: Option<f64>,
    spent_usd: Mutex<f64>,
    workers: Mutex<HashMap<WorkerId, ManagedWorker>>,
}

impl Manager {
    fn remaining_budget(&self) -> Option<f64> {
        self.total_budget_usd.map(|total| total - *self.spent_usd.lock())
    }

    fn get_worker(&self, id: WorkerId) -> Result<Arc<Worker>, ManagerError> {
        self.workers
            .lock()
            .get(&id)
            .map(|m| m.worker.clone())
            .ok_or(ManagerError::NotFound(id))
    }

    /// Routes `task` (via the complexity→kind preference unless `method`
    /// pins a transport), admits it into the pool under `policy`, and
    /// constructs the worker through the injected [`BackendLauncher`].
    /// Returns once the worker has reached `ready` or failed to start
    /// (spec §4.8 `spawn`).
    pub async fn spawn(
        self: &Arc<Self>,
        task: TaskSpec,
        method: Option<WorkerMethod>,
        policy: BackpressurePolicy,
    ) -> Result<WorkerId, ManagerError> {
        let budget = BudgetState {
            remaining_budget_usd: self.remaining_budget(),
        };
        let decision = match method {
            Some(m) => orc_router::route_with_method(&task, &self.catalog, &budget, m),
            None => orc_router::route(&task, &self.catalog, &self.routing, &budget),
        }
        .ok_or(ManagerError::NoProvider)?;

        let provider = self
            .catalog
            .get(&decision.provider)
            .expect("router only names providers present in its own catalog")
            .clone();

        let permit = self.pool.acquire(&provider.name, policy).await?;

        let worker = match self
            .launcher
            .launch(&task, &provider, decision.method, self.retention_window)
            .await
        {
            Ok(worker) => Arc::new(worker),
            Err(source) => {
                drop(permit);
                return Err(ManagerError::Worker(source));
            }
        };
        let id = worker.id();

        self.workers.lock().insert(
            id,
            ManagedWorker {
                worker: worker.clone(),
                task_id: task.id.clone(),
                provider: provider.name.clone(),
                permit: Some(permit),
            },
        );

        self.spawn_supervisor(id, worker);
        Ok(id)
    }

    /// Watches a freshly spawned worker to terminality, rolls its cost into
    /// the running budget ledger, releases its pool slot, and evicts it
    /// from the worker table once the retention window elapses.
    fn spawn_supervisor(self: &Arc<Self>, id: WorkerId, worker: Arc<Worker>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let snapshot = worker.poll().await;
                if snapshot.state.is_terminal() {
                    *manager.spent_usd.lock() += snapshot.cost_usd;
                    if let Some(managed) = manager.workers.lock().get_mut(&id) {
                        managed.permit = None;
                    }
                    break;
                }
                tokio::time::sleep(SUPERVISOR_POLL_INTERVAL).await;
            }
            tokio::time::sleep(manager.retention_window).await;
            manager.workers.lock().remove(&id);
        });
    }

    /// Sends `text` to a `ready` worker (spec §4.8 `prompt`). Errors
    /// `WrongState`/`Timeout`/`BackendGone` surface from the worker
    /// directly, per its own state-machine and transport errors.
    pub async fn prompt(&self, id: WorkerId, text: impl Into<String>) -> Result<(), ManagerError> {
        let worker = self.get_worker(id)?;
        worker.send(text).await.map_err(ManagerError::Worker)
    }

    /// Non-blocking snapshot (spec §4.8 `status`). `NotFound` once the
    /// worker has aged out of its retention window.
    pub async fn status(&self, id: WorkerId) -> Result<WorkerSnapshot, ManagerError> {
        let worker = self.get_worker(id)?;
        Ok(worker.poll().await)
    }

    /// Output bytes appended since `since` plus the new cursor (spec §4.8
    /// `output`).
    pub async fn output(&self, id: WorkerId, since: usize) -> Result<(Vec<u8>, usize), ManagerError> {
        let worker = self.get_worker(id)?;
        Ok(worker.read_output(since).await)
    }

    /// Requests cancellation and acknowledges without waiting for the
    /// worker to reach a terminal state (spec §4.8 `cancel`); idempotent
    /// once the worker is already terminal.
    pub async fn cancel(&self, id: WorkerId, reason: Option<&str>) -> Result<(), ManagerError> {
        let worker = self.get_worker(id)?;
        worker.cancel(reason).await.map_err(ManagerError::Worker)
    }

    /// Snapshots of every tracked worker matching `filter` (spec §4.8
    /// `list`).
    pub async fn list(&self, filter: &ListFilter) -> Vec<WorkerSnapshot> {
        let candidates: Vec<(Arc<Worker>, String, String)> = self
            .workers
            .lock()
            .values()
            .filter(|m| filter.provider.as_deref().map_or(true, |p| p == m.provider))
            .filter(|m| filter.task_id.as_deref().map_or(true, |t| t == m.task_id))
            .map(|m| (m.worker.clone(), m.provider.clone(), m.task_id.clone()))
            .collect();

        let mut out = Vec::with_capacity(candidates.len());
        for (worker, _, _) in candidates {
            let snapshot = worker.poll().await;
            if filter.state.map_or(true, |s| s == snapshot.state) {
                out.push(snapshot);
            }
        }
        out
    }

    /// Routing decision plus rationale, without admitting or spawning
    /// anything (spec §4.8 `recommend`).
    pub fn recommend(&self, task: &TaskSpec) -> Recommendation {
        let budget = BudgetState {
            remaining_budget_usd: self.remaining_budget(),
        };
        orc_router::recommend(task, &self.catalog, &self.routing, &budget)
    }

    /// The full provider catalog (spec §4.8 `provider_list`).
    pub fn provider_list(&self) -> Vec<Provider> {
        self.catalog.iter().cloned().collect()
    }

    /// Gathers [`MemberResult`]s for every worker in `group` from this
    /// manager's own table and folds them through [`orc_aggregator`].
    /// Returns `None` if any member has not reached a terminal state yet,
    /// or has already aged out of the retention window.
    pub async fn summarize_group(&self, group: &ExecutionGroup) -> Option<ExecutionSummary> {
        let mut members = Vec::with_capacity(group.worker_ids.len());
        for &id in &group.worker_ids {
            let worker = self.get_worker(id).ok()?;
            let snapshot = worker.poll().await;
            let (output, _) = worker.read_output(0).await;
            let tool_calls = worker.tool_calls().await;
            members.push(MemberResult {
                worker_id: id,
                state: snapshot.state,
                started_at: snapshot.started_at,
                ended_at: snapshot.ended_at,
                output,
                usage: snapshot.usage,
                cost_usd: snapshot.cost_usd,
                tool_calls,
            });
        }
        orc_aggregator::summarize(group, &members)
    }
}

/// Builds a [`Manager`], registering one pool slot per catalog entry from
/// each provider's `max_concurrency` (spec §4.5 "Pool is seeded from the
/// provider catalog at startup").
pub struct ManagerBuilder {
    catalog: ProviderCatalog,
    launcher: Arc<dyn BackendLauncher>,
    routing: RoutingConfig,
    global_max_concurrency: usize,
    retention_window: Duration,
    total_budget_usd: Option<f64>,
}

impl ManagerBuilder {
    pub fn new(catalog: ProviderCatalog, launcher: Arc<dyn BackendLauncher>) -> Self {
        Self {
            catalog,
            launcher,
            routing: RoutingConfig::default(),
            global_max_concurrency: 8,
            retention_window: DEFAULT_RETENTION_WINDOW,
            total_budget_usd: None,
        }
    }

    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    pub fn global_max_concurrency(mut self, n: usize) -> Self {
        self.global_max_concurrency = n;
        self
    }

    pub fn retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    pub fn total_budget_usd(mut self, budget: f64) -> Self {
        self.total_budget_usd = Some(budget);
        self
    }

    pub fn build(self) -> Arc<Manager> {
        let pool = Pool::from_catalog(&self.catalog, self.global_max_concurrency);
        Arc::new(Manager {
            catalog: self.catalog,
            routing: self.routing,
            pool,
            launcher: self.launcher,
            retention_window: self.retention_window,
            total_budget_usd: self.total_budget_usd,
            spent_usd: Mutex::new(0.0),
            workers: Mutex::new(HashMap::new()),
        })
    }
}
