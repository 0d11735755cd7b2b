use chrono::{DateTime, Utc};
use serde_json::Value;

/// An append-only entry in a worker's event stream (spec §3 `events`).
/// ACP workers append one per `session/update` notification; CLI/API
/// workers append a single terminal event since neither transport exposes
/// mid-invocation notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEvent {
    pub at: DateTime<Utc>,
    pub kind: String,
    pub detail: Value,
}

impl WorkerEvent {
    pub fn new(kind: impl Into<String>, detail: Value) -> Self {
        Self {
            at: Utc::now(),
            kind: kind.into(),
            detail,
        }
    }
}
