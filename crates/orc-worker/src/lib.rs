#![forbid(unsafe_code)]
//! Uniform handle over an ACP session, a CLI invocation, or a direct API
//! call (spec §4.4).
//!
//! `codex` and `claude_code` each keep their own independent client
//! struct, owning its own transport and exposing its own
//! lifecycle methods. This crate generalizes that shape into one
//! tagged-variant [`Worker`] so callers drive all three backends through a
//! single `{start, send, poll, read_output, cancel}` surface.

mod error;
mod event;
mod worker;

pub use error::WorkerError;
pub use event::WorkerEvent;
pub use worker::Worker;
