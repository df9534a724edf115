//! Rate limiting integration tests
//!
//! The limit comes from the stored settings: `rate_limit_requests` calls
//! per `rate_limit_window` seconds, tracked per client address.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::Value;

use switchyard::{
    store::{AppSettings, Dialect},
    Config,
};

use crate::common::{test_config, test_data, TestHarness};

fn tight_settings() -> AppSettings {
    AppSettings {
        rate_limit_enabled: true,
        rate_limit_requests: 2,
        rate_limit_window: 1,
        ..AppSettings::default()
    }
}

async fn limited_harness() -> TestHarness {
    let harness = TestHarness::with_settings(tight_settings()).await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("ok", "x").await;
    harness
}

fn forwarded_for(ip: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    )
}

#[tokio::test]
async fn test_third_request_in_window_is_rejected() {
    let harness = limited_harness().await;

    for _ in 0..2 {
        harness
            .post_messages("/v1/messages/openrouter", &test_data::messages_request())
            .await
            .assert_status_ok();
    }

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "RATE_LIMIT_ERROR");
    assert_eq!(body["error"]["status"], 429);
    assert_eq!(response.header("x-ratelimit-limit"), "2");
    assert!(response.headers().contains_key("retry-after"));

    assert_eq!(harness.upstream.requests().await.len(), 2);
}

#[tokio::test]
async fn test_requests_allowed_again_after_window() {
    let harness = limited_harness().await;

    for _ in 0..2 {
        harness
            .post_messages("/v1/messages/openrouter", &test_data::messages_request())
            .await
            .assert_status_ok();
    }
    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let harness = limited_harness().await;
    let first = harness.server_from("10.0.0.1:40000");
    let second = harness.server_from("10.0.0.2:40000");

    for server in [&first, &first, &second] {
        server
            .post("/v1/messages/openrouter")
            .json(&test_data::messages_request())
            .await
            .assert_status_ok();
    }

    first
        .post("/v1/messages/openrouter")
        .json(&test_data::messages_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // A new source port is still the same client.
    harness
        .server_from("10.0.0.1:40001")
        .post("/v1/messages/openrouter")
        .json(&test_data::messages_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_escape_limit() {
    let harness = TestHarness::with_settings(AppSettings {
        rate_limit_window: 60,
        ..tight_settings()
    })
    .await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("ok", "x").await;
    let client = harness.server_from("198.51.100.4:50000");

    let mut statuses = Vec::new();
    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"] {
        let (name, value) = forwarded_for(ip);
        let response = client
            .post("/v1/messages/openrouter")
            .add_header(name, value)
            .json(&test_data::messages_request())
            .await;
        statuses.push(response.status_code().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 429, 429, 429]);
    assert_eq!(harness.upstream.requests().await.len(), 2);
}

#[tokio::test]
async fn test_forwarded_for_keys_the_limit_behind_trusted_proxy() {
    let config = Config {
        trust_forwarded_for: true,
        ..test_config()
    };
    let harness = TestHarness::with_config(config, tight_settings()).await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("ok", "x").await;
    let proxy = harness.server_from("127.0.0.1:8080");

    for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2"] {
        let (name, value) = forwarded_for(ip);
        proxy
            .post("/v1/messages/openrouter")
            .add_header(name, value)
            .json(&test_data::messages_request())
            .await
            .assert_status_ok();
    }

    let (name, value) = forwarded_for("10.0.0.1");
    proxy
        .post("/v1/messages/openrouter")
        .add_header(name, value)
        .json(&test_data::messages_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_limit_applies_before_body_parsing() {
    let harness = limited_harness().await;

    for _ in 0..2 {
        harness
            .post_messages("/v1/messages/openrouter", &test_data::messages_request())
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .post("/v1/messages/openrouter")
        .bytes("{not json".into())
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_disabled_limit_never_rejects() {
    let harness = TestHarness::with_settings(AppSettings {
        rate_limit_enabled: false,
        ..tight_settings()
    })
    .await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("ok", "x").await;

    for _ in 0..5 {
        harness
            .post_messages("/v1/messages/openrouter", &test_data::messages_request())
            .await
            .assert_status_ok();
    }
}

#[tokio::test]
async fn test_prune_follows_the_stored_window() {
    let harness = limited_harness().await;
    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();
    assert_eq!(harness.state.rate_limiter.tracked_clients(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Widened after the call was counted: the entry is still inside the window.
    harness.update_settings(|s| s.rate_limit_window = 60).await;
    harness.state.prune_rate_limits().await.unwrap();
    assert_eq!(harness.state.rate_limiter.tracked_clients(), 1);

    harness.update_settings(|s| s.rate_limit_window = 1).await;
    harness.state.prune_rate_limits().await.unwrap();
    assert_eq!(harness.state.rate_limiter.tracked_clients(), 0);
}
