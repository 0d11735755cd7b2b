use orc_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rejected request with status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limit retry budget exhausted after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("malformed SSE frame: {0}")]
    Protocol(String),
    #[error("failed to parse JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Protocol(_) | ApiError::Json(_) => ErrorKind::ProtocolError,
            ApiError::Http { status, .. } if *status == 429 => ErrorKind::RateLimited,
            ApiError::Http { .. } | ApiError::Transport(_) => ErrorKind::BackendGone,
        }
    }

    /// HTTP 429/5xx and transport-level errors are transient; other 4xx
    /// responses are terminal (spec §7 retry policy).
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            ApiError::RateLimited { .. } | ApiError::Protocol(_) | ApiError::Json(_) => false,
        }
    }
}
