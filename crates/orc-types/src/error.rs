use serde::{Deserialize, Serialize};

/// Stable error taxonomy shared across the core (spec §7). Individual crates
/// keep their own `thiserror` error enums for rich `{source}` chains; each
/// exposes a `kind() -> ErrorKind` so callers of `status()`/`spawn()` get a
/// stable code regardless of which transport produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoProvider,
    Saturated,
    BackendMissing,
    HandshakeRefused,
    WrongState,
    Timeout,
    Cancelled,
    BackendGone,
    CliError,
    ProtocolError,
    RateLimited,
    ConfigInvalid,
    BudgetExceeded,
}

impl ErrorKind {
    /// Short human message (spec §7 "Each error kind maps to a stable code
    /// and a short human message").
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::NoProvider => "no provider satisfies the task's constraints",
            ErrorKind::Saturated => "provider or global concurrency limit reached",
            ErrorKind::BackendMissing => "backend binary or endpoint is unavailable",
            ErrorKind::HandshakeRefused => "backend refused session initialization",
            ErrorKind::WrongState => "operation is not valid in the worker's current state",
            ErrorKind::Timeout => "operation exceeded its deadline",
            ErrorKind::Cancelled => "operation was cancelled",
            ErrorKind::BackendGone => "backend process or connection terminated unexpectedly",
            ErrorKind::CliError => "CLI backend exited with a non-zero status",
            ErrorKind::ProtocolError => "malformed wire frame exceeded the tolerance threshold",
            ErrorKind::RateLimited => "backend rate limit exhausted the retry budget",
            ErrorKind::ConfigInvalid => "configuration failed validation",
            ErrorKind::BudgetExceeded => "task cost exceeds the configured budget",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}
