#![forbid(unsafe_code)]
//! Shared data model for the worker orchestration core.
//!
//! This crate has no I/O and no async runtime dependency. It defines the
//! vocabulary (`TaskSpec`, `Provider`, `Worker` state, the error taxonomy)
//! that every other `orc-*` crate builds on, the way a shared
//! `*-types`/`*-protocol` crate sits under its transport and engine
//! crates.

mod cost;
mod error;
mod group;
mod provider;
mod task;
mod worker;

pub use cost::compute_cost_usd;
pub use error::ErrorKind;
pub use group::MergeStrategy;
pub use provider::{Provider, ProviderCatalog, ProviderKind};
pub use task::{ComplexityHint, TaskSpec};
pub use worker::{
    ToolCall, ToolOp, Usage, WorkerId, WorkerMethod, WorkerSnapshot, WorkerState,
};
