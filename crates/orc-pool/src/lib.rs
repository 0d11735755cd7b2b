#![forbid(unsafe_code)]
//! Bounded per-provider and global concurrency admission (spec §4.5, §5).
//!
//! No direct analog in `codex`/`claude_code` — each invokes one subprocess
//! at a time with no admission control. Grounded on spec §5's locking
//! discipline ("one lock per provider queue plus one for global
//! counters"), implemented with `parking_lot::Mutex`, the short
//! critical-section lock several pack repos (`oddjobs`, `astrid`) use for
//! exactly this kind of counter/queue state.

mod error;
mod pool;

pub use error::PoolError;
pub use pool::{BackpressurePolicy, Pool, PoolPermit};
