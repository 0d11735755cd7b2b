#![forbid(unsafe_code)]
//! HTTP streaming transport for direct provider API backends.
//!
//! Neither `codex` nor `claude_code` speaks raw provider HTTP; enriched from
//! `zed-industries-codex`'s session/turn-scoped client shape, generalized
//! to the Anthropic-message and OpenAI-compatible `choices[].delta` wire
//! shapes this spec targets.

mod client;
mod decode;
mod error;
mod rate_limit;
mod retry;

pub use client::{default_http_client, ApiClient, ApiConfig, StreamResult, WireShape};
pub use decode::StreamEvent;
pub use error::ApiError;
pub use rate_limit::TokenBucket;
pub use retry::RetryPolicy;
