use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use orc_types::Usage;
use reqwest::Client;

use crate::decode::{decode_anthropic_event, decode_openai_compat_event, StreamEvent};
use crate::error::ApiError;
use crate::rate_limit::TokenBucket;
use crate::retry::RetryPolicy;

/// Which of the two streaming wire shapes a provider speaks (spec §6
/// "Backend wire protocols (API)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    AnthropicMessages,
    OpenAiCompat,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub bearer_token: String,
    pub wire_shape: WireShape,
    pub model: String,
    pub retry: RetryPolicy,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: f64,
}

/// Outcome of one fully-drained streamed call: concatenated text plus
/// summed usage, after retries have been exhausted or the stream
/// completed (spec §6 "the transport yields text chunks and usage
/// counters as they arrive").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamResult {
    pub text: String,
    pub usage: Usage,
}

/// HTTP streaming transport for direct provider API backends (spec §4.3).
///
/// Neither `codex` nor `claude_code` speaks raw provider HTTP (both only wrap
/// CLIs); enriched from the session/turn-scoped client shape and
/// retry-on-transient-status loop in
/// `zed-industries-codex`'s `core/src/client.rs`, generalized from its
/// 401-refresh retry to the 429/5xx retry policy this spec requires.
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    limiter: Arc<TokenBucket>,
}

impl ApiClient {
    pub fn new(http: Client, config: ApiConfig) -> Self {
        let limiter = Arc::new(TokenBucket::new(
            config.rate_limit_capacity,
            config.rate_limit_refill_per_sec,
        ));
        Self {
            http,
            config,
            limiter,
        }
    }

    /// Streams one completion for `body`, retrying transient failures per
    /// the configured [`RetryPolicy`]. Each retry opens a fresh connection;
    /// output accumulated from a failed attempt is discarded (spec §7).
    pub async fn stream(&self, body: serde_json::Value) -> Result<StreamResult, ApiError> {
        self.limiter.acquire().await;

        let mut attempt = 0;
        loop {
            match self.stream_once(&body).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt + 1 < self.config.retry.max_attempts => {
                    tracing::warn!(attempt, error = %err, "retrying streamed API call");
                    tokio::time::sleep(self.config.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(ApiError::RateLimited {
                        attempts: self.config.retry.max_attempts,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn stream_once(&self, body: &serde_json::Value) -> Result<StreamResult, ApiError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.bearer_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut events = response.bytes_stream().eventsource();
        let mut result = StreamResult::default();

        while let Some(frame) = events.next().await {
            let frame = frame.map_err(|err| ApiError::Protocol(err.to_string()))?;
            let decoded = match self.config.wire_shape {
                WireShape::AnthropicMessages => decode_anthropic_event(&frame)?,
                WireShape::OpenAiCompat => decode_openai_compat_event(&frame)?,
            };

            match decoded {
                Some(StreamEvent::TextDelta(text)) => result.text.push_str(&text),
                Some(StreamEvent::Usage(usage)) => result.usage.add(usage),
                Some(StreamEvent::Done) => break,
                None => {}
            }
        }

        Ok(result)
    }
}

pub fn default_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .expect("reqwest client with valid TLS backend")
}
