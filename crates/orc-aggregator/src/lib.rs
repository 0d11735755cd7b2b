#![forbid(unsafe_code)]
//! Joins parallel workers into an [`ExecutionGroup`], detects file-level
//! conflicts, and rolls up usage/cost (spec §4.7).
//!
//! Pure like [`orc_router`](../orc_router/index.html): no locks, no I/O.
//! The caller (`orc-manager`) is the one holding per-worker locks when it
//! gathers each [`MemberResult`] from a live `Worker`; this crate only
//! folds the snapshots it is handed.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use orc_types::{ToolCall, Usage, WorkerId, WorkerState};

/// Separator the `concat` merge strategy places between successful
/// workers' outputs (spec §4.7 "separated by a record boundary").
pub const RECORD_BOUNDARY: &[u8] = b"\n---\n";

/// How a group's final result is picked from its member workers (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    FirstSuccess,
    LastSuccess,
    Concat,
}

impl From<orc_types::MergeStrategy> for MergeStrategy {
    fn from(value: orc_types::MergeStrategy) -> Self {
        match value {
            orc_types::MergeStrategy::FirstSuccess => MergeStrategy::FirstSuccess,
            orc_types::MergeStrategy::LastSuccess => MergeStrategy::LastSuccess,
            orc_types::MergeStrategy::Concat => MergeStrategy::Concat,
        }
    }
}

/// A set of workers launched for one logical task (spec §3 `ExecutionGroup`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGroup {
    pub group_id: String,
    pub worker_ids: BTreeSet<WorkerId>,
    pub merge_strategy: MergeStrategy,
}

/// Everything the aggregator needs from one member worker. The caller
/// builds this from `Worker::poll` plus `Worker::tool_calls` and
/// `Worker::read_output(0)`; kept separate from `orc_types::WorkerSnapshot`
/// so that crate stays free of an aggregator-only `tool_calls` field.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberResult {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub output: Vec<u8>,
    pub usage: Usage,
    pub cost_usd: f64,
    pub tool_calls: Vec<ToolCall>,
}

/// Folded result of one execution group (spec §3 `ExecutionSummary`).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSummary {
    pub group_id: String,
    pub result: Option<Vec<u8>>,
    pub conflicts: BTreeSet<String>,
    pub usage: Usage,
    pub cost_usd: f64,
    pub duration: Duration,
}

/// Whether every member of `group` has reached a terminal state (spec §4.7
/// "The group completes when every member worker has reached a terminal
/// state"). `members` need not be exhaustive or ordered; any group member
/// missing from it counts as not yet terminal.
pub fn is_complete(group: &ExecutionGroup, members: &[MemberResult]) -> bool {
    group.worker_ids.iter().all(|id| {
        members
            .iter()
            .find(|m| &m.worker_id == id)
            .is_some_and(|m| m.state.is_terminal())
    })
}

/// Folds `members` into an [`ExecutionSummary`]. Returns `None` if the
/// group has not yet completed; callers should poll again rather than
/// treat that as a failure.
pub fn summarize(group: &ExecutionGroup, members: &[MemberResult]) -> Option<ExecutionSummary> {
    if !is_complete(group, members) {
        return None;
    }

    let relevant: Vec<&MemberResult> = members
        .iter()
        .filter(|m| group.worker_ids.contains(&m.worker_id))
        .collect();

    let usage = relevant.iter().fold(Usage::default(), |mut acc, m| {
        acc.add(m.usage);
        acc
    });
    let cost_usd = relevant.iter().map(|m| m.cost_usd).sum();
    let duration = relevant
        .iter()
        .copied()
        .filter_map(member_duration)
        .max()
        .unwrap_or_default();

    Some(ExecutionSummary {
        group_id: group.group_id.clone(),
        result: merge_result(group.merge_strategy, &relevant),
        conflicts: detect_conflicts(&relevant),
        usage,
        cost_usd,
        duration,
    })
}

fn member_duration(member: &MemberResult) -> Option<Duration> {
    let started = member.started_at?;
    let ended = member.ended_at?;
    ended.signed_duration_since(started).to_std().ok()
}

fn merge_result(strategy: MergeStrategy, members: &[&MemberResult]) -> Option<Vec<u8>> {
    let mut successful: Vec<&MemberResult> = members
        .iter()
        .copied()
        .filter(|m| m.state == WorkerState::Completed)
        .collect();
    if successful.is_empty() {
        return None;
    }

    match strategy {
        MergeStrategy::FirstSuccess => {
            successful.sort_by_key(|m| (m.ended_at, m.worker_id));
            Some(successful.first()?.output.clone())
        }
        MergeStrategy::LastSuccess => {
            successful.sort_by_key(|m| (m.ended_at, m.worker_id));
            Some(successful.last()?.output.clone())
        }
        MergeStrategy::Concat => {
            successful.sort_by_key(|m| m.worker_id);
            let mut combined = Vec::new();
            for (i, member) in successful.iter().enumerate() {
                if i > 0 {
                    combined.extend_from_slice(RECORD_BOUNDARY);
                }
                combined.extend_from_slice(&member.output);
            }
            Some(combined)
        }
    }
}

/// Two workers conflict on path `p` if both recorded a `write` or `edit`
/// entry for `p` (spec §4.7 "Conflict detection"); read-only access never
/// conflicts, including when several workers read the same path (S4).
fn detect_conflicts(members: &[&MemberResult]) -> BTreeSet<String> {
    let mut writers: std::collections::BTreeMap<String, BTreeSet<WorkerId>> =
        std::collections::BTreeMap::new();
    for member in members {
        for call in &member.tool_calls {
            if call.op.is_mutation() {
                writers
                    .entry(call.path.clone())
                    .or_default()
                    .insert(member.worker_id);
            }
        }
    }
    writers
        .into_iter()
        .filter(|(_, owners)| owners.len() >= 2)
        .map(|(path, _)| path)
        .collect()
}
