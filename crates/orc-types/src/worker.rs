use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Opaque worker identifier (spec §3 "`id` (opaque)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which transport a worker was dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMethod {
    Acp,
    Cli,
    Api,
}

/// Worker lifecycle state (spec §3). Transitions are monotonic along the
/// order declared here except `Cancelling -> Failed`; no state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Pending,
    Initializing,
    Ready,
    Running,
    Cancelling,
    Completed,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Failed)
    }

    /// Whether `to` is a legal successor of `self` under the monotonic
    /// ordering plus the single documented exception (spec §3 invariant 1):
    /// once `Cancelling`, the only legal next state is `Failed` — cancellation
    /// never resolves to `Completed`, even though `Completed` sits later in
    /// the declared enum order.
    pub fn can_transition_to(self, to: WorkerState) -> bool {
        if self == WorkerState::Cancelling {
            return to == WorkerState::Failed;
        }
        if self == to {
            return false;
        }
        to > self
    }
}

/// A mutating or read file access recorded against a worker (spec §3 `tool_calls`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOp {
    Read,
    Write,
    Edit,
}

impl ToolOp {
    /// Writes and edits are both "mutating" for conflict-detection purposes (spec §4.7).
    pub fn is_mutation(self) -> bool {
        matches!(self, ToolOp::Write | ToolOp::Edit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub path: String,
    pub op: ToolOp,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.tokens_in += other.tokens_in;
        self.tokens_out += other.tokens_out;
    }
}

/// A point-in-time, non-blocking snapshot returned by `Worker::poll` /
/// `Manager::status` (spec §4.4, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub task_id: String,
    pub provider: String,
    pub method: WorkerMethod,
    pub state: WorkerState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub output_len: usize,
    pub events_len: usize,
    pub output_truncated: bool,
    pub usage: Usage,
    pub cost_usd: f64,
    pub error: Option<ErrorKind>,
}
