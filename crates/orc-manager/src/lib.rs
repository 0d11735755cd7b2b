#![forbid(unsafe_code)]
//! Facade tying the router, pool, worker, and aggregator together behind
//! eight operations: `spawn`, `prompt`, `status`, `output`, `cancel`,
//! `list`, `recommend`, `provider_list` (spec §4.8, §6).
//!
//! Neither `codex` nor `claude_code` has a facade of this shape — each owns
//! its client end to end. This crate is the thinnest layer that
//! can sit in front of [`orc_router`], [`orc_pool`], [`orc_worker`], and
//! [`orc_aggregator`] without re-deriving any of their logic: routing stays
//! pure, admission stays in the pool, and a worker's own state machine is
//! never second-guessed here.

mod error;
mod launcher;
mod manager;

pub use error::ManagerError;
pub use launcher::BackendLauncher;
pub use manager::{ListFilter, Manager, ManagerBuilder, DEFAULT_RETENTION_WINDOW};
