//! Error handling integration tests
//!
//! Proxy-side failures use the `{"error": {message, code, status}}` shape
//! with a fixed code taxonomy. Upstream error replies are relayed verbatim.

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestResponse;
use serde_json::{json, Value};
use wiremock::{matchers::method, Mock, ResponseTemplate};

use switchyard::store::{AppSettings, Dialect, ProviderDefinition};

use crate::common::{relaxed_settings, test_data, TestHarness};
use crate::mocks::{UpstreamData, CHAT_COMPLETIONS_PATH, MESSAGES_PATH};

fn assert_error(response: &TestResponse, status: StatusCode, code: &str) {
    response.assert_status(status);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], code);
    assert_eq!(body["error"]["status"], status.as_u16());
    assert!(body["error"]["message"].is_string());
}

async fn post_raw(harness: &TestHarness, body: &'static str, content_type: &str) -> TestResponse {
    harness
        .server
        .post("/v1/messages/openrouter")
        .bytes(body.into())
        .content_type(content_type)
        .await
}

#[tokio::test]
async fn test_malformed_json_never_reaches_resolution() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;

    let response = post_raw(&harness, "{\"model\": ", "application/json").await;

    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_REQUEST");
    assert_eq!(harness.store.lookup_count(), 0);
    assert!(harness.upstream.requests().await.is_empty());
}

#[tokio::test]
async fn test_non_json_content_type_is_invalid() {
    let harness = TestHarness::new().await;

    let response = post_raw(&harness, "hello", "text/plain").await;

    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_REQUEST");
}

#[tokio::test]
async fn test_empty_bodies() {
    let harness = TestHarness::new().await;

    for body in ["", "{}", "null"] {
        let response = post_raw(&harness, body, "application/json").await;
        assert_error(&response, StatusCode::BAD_REQUEST, "EMPTY_REQUEST");
    }
    assert_eq!(harness.store.lookup_count(), 0);
}

#[tokio::test]
async fn test_schema_violations_are_validation_errors() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;

    let cases = [
        json!({"messages": [{"role": "user", "content": "hi"}]}),
        json!({"model": "claude-3-haiku-20240307"}),
        json!({"model": "claude-3-haiku-20240307", "messages": "hi"}),
        json!({"model": "claude-3-haiku-20240307", "messages": [], "max_tokens": 5000}),
        json!({"model": "claude-3-haiku-20240307", "messages": [], "temperature": 1.5}),
        json!({"model": "claude-3-haiku-20240307", "messages": [{"role": "system", "content": "x"}]}),
    ];

    for case in cases {
        let response = harness.post_messages("/v1/messages/openrouter", &case).await;
        assert_error(&response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    }
    assert_eq!(harness.store.lookup_count(), 0);
}

#[tokio::test]
async fn test_upstream_error_relayed_verbatim() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    let upstream_body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
    harness
        .upstream
        .mock_error(CHAT_COMPLETIONS_PATH, 503, upstream_body, "application/json")
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), upstream_body);
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("application/json"));
}

#[tokio::test]
async fn test_upstream_plain_text_error_keeps_content_type() {
    let harness = TestHarness::new().await;
    harness.add_provider("Grok (Direct)", Dialect::Canonical).await;
    harness
        .upstream
        .mock_error(MESSAGES_PATH, 429, "slow down", "text/plain")
        .await;

    let response = harness
        .post_messages("/v1/messages/grok-direct", &test_data::messages_request())
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.text(), "slow down");
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_unparseable_upstream_body() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_garbage(CHAT_COMPLETIONS_PATH).await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    assert_error(&response, StatusCode::INTERNAL_SERVER_ERROR, "RESPONSE_PARSE_ERROR");
}

#[tokio::test]
async fn test_untranslatable_upstream_body() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness
        .upstream
        .mock_chat_completion_body(json!({"id": "chatcmpl-1", "choices": []}))
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    assert_error(&response, StatusCode::INTERNAL_SERVER_ERROR, "RESPONSE_PROCESS_ERROR");
    assert!(harness.store.logged_requests().is_empty());
}

#[tokio::test]
async fn test_block_and_tool_shape_errors_are_validation_errors() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.add_provider("Grok (Direct)", Dialect::Canonical).await;

    let model = "claude-3-haiku-20240307";
    let cases = [
        json!({"model": model, "messages": [{"role": "user", "content": [{"type": "text"}]}]}),
        json!({"model": model, "messages": [
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": [{"type": "tool_use", "name": "get_weather", "input": {}}]}
        ]}),
        json!({
            "model": model,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"name": "get_weather", "description": "no schema"}]
        }),
        json!({
            "model": model,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"description": "tool without a name", "input_schema": {}}]
        }),
    ];

    for path in ["/v1/messages/openrouter", "/v1/messages/grok-direct"] {
        for case in &cases {
            let response = harness.post_messages(path, case).await;
            assert_error(&response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
        }
    }
    assert!(harness.upstream.requests().await.is_empty());
    assert_eq!(harness.store.lookup_count(), 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_provider_error() {
    let harness = TestHarness::new().await;
    harness
        .save(ProviderDefinition::new(
            "OpenRouter",
            "http://127.0.0.1:1",
            Dialect::OpenAi,
        ))
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    assert_error(&response, StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR");
}

#[tokio::test]
async fn test_upstream_timeout_is_provider_error_without_retry() {
    let harness = TestHarness::with_settings(AppSettings {
        request_timeout: 1,
        ..relaxed_settings()
    })
    .await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(UpstreamData::chat_completion("late", "x"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(harness.upstream.server())
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    assert_error(&response, StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR");
    assert_eq!(harness.upstream.requests().await.len(), 1);
}
