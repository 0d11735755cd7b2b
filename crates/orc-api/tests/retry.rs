use std::time::Duration;

use orc_api::{default_http_client, ApiClient, ApiConfig, ApiError, RetryPolicy, WireShape};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        base: Duration::from_millis(1),
        factor: 2,
        jitter: 0.0,
        cap: Duration::from_millis(10),
        max_attempts: 3,
    }
}

#[tokio::test]
async fn exhausts_retry_budget_on_repeated_429_and_returns_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let config = ApiConfig {
        endpoint: format!("{}/v1/messages", server.uri()),
        bearer_token: "test-token".to_string(),
        wire_shape: WireShape::AnthropicMessages,
        model: "claude-test".to_string(),
        retry: fast_retry_policy(),
        rate_limit_capacity: 10,
        rate_limit_refill_per_sec: 100.0,
    };
    let client = ApiClient::new(default_http_client(), config);

    let err = client
        .stream(serde_json::json!({ "model": "claude-test" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RateLimited { attempts: 3 }));

    server.verify().await;
}

#[tokio::test]
async fn non_429_four_xx_is_terminal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ApiConfig {
        endpoint: format!("{}/v1/messages", server.uri()),
        bearer_token: "test-token".to_string(),
        wire_shape: WireShape::AnthropicMessages,
        model: "claude-test".to_string(),
        retry: fast_retry_policy(),
        rate_limit_capacity: 10,
        rate_limit_refill_per_sec: 100.0,
    };
    let client = ApiClient::new(default_http_client(), config);

    let err = client
        .stream(serde_json::json!({ "model": "claude-test" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 400, .. }));

    server.verify().await;
}
