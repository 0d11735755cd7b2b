#![forbid(unsafe_code)]
//! One-shot subprocess transport for CLI-invoked backends.
//!
//! Grounded on `claude_code/src/process.rs`'s spawn-with-retry and
//! tee'd-stdio run loop, extended with process-group kill-on-timeout.

mod client;
mod error;
mod process;

pub use client::{CliClient, CliClientBuilder};
pub use error::CliError;
pub use process::CommandOutput;
