//! Messages endpoint integration tests
//!
//! Tests for POST /v1/messages/:token against both upstream dialects:
//! - OpenAI-dialect providers get a translated request and the reply is
//!   translated back
//! - Canonical-dialect providers get the caller's body with the model
//!   rewritten, and their reply is returned as-is

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use switchyard::store::{Dialect, ProviderDefinition};

use crate::common::{constants, test_data, TestHarness};
use crate::mocks::{FailingLogger, UpstreamData};

#[tokio::test]
async fn test_openai_dialect_round_trip() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness
        .upstream
        .mock_chat_completion("Hello! How can I help?", "openai/gpt-4o")
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["type"], "message");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["model"], "openai/gpt-4o");
    assert_eq!(body["content"][0]["type"], "text");
    assert_eq!(body["content"][0]["text"], "Hello! How can I help?");
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"]["input_tokens"], 12);
    assert_eq!(body["usage"]["output_tokens"], 7);

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["model"], "openai/gpt-4o");
    assert_eq!(sent["max_tokens"], 256);
    assert_eq!(
        sent["messages"],
        json!([{"role": "user", "content": "Hello, how are you?"}])
    );
}

#[tokio::test]
async fn test_upstream_receives_bearer_credentials() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("ok", "m").await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();

    let requests = harness.upstream.requests().await;
    assert_eq!(requests.len(), 1);
    let auth = requests[0]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(auth, format!("Bearer {}", constants::TEST_UPSTREAM_KEY));
    assert!(requests[0].headers.get("openai-organization").is_none());
}

#[tokio::test]
async fn test_stored_mapping_overrides_adapter_default() {
    let harness = TestHarness::new().await;
    harness
        .save(
            ProviderDefinition::new("OpenRouter", harness.upstream.uri(), Dialect::OpenAi)
                .with_mapping(constants::CANONICAL_MODEL, "meta-llama/llama-3-70b"),
        )
        .await;
    harness.upstream.mock_chat_completion("ok", "meta-llama/llama-3-70b").await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["model"], "meta-llama/llama-3-70b");
}

#[tokio::test]
async fn test_mapping_falls_back_to_normalized_then_family_key() {
    let harness = TestHarness::new().await;
    harness
        .save(
            ProviderDefinition::new("Chutes", harness.upstream.uri(), Dialect::OpenAi)
                .with_mapping("Claude_Instant 1", "chutes/instant")
                .with_mapping("claude", "chutes/family-default"),
        )
        .await;
    harness.upstream.mock_chat_completion("ok", "x").await;

    let mut request = test_data::messages_request();
    request["model"] = json!("claude-instant-1");
    harness
        .post_messages("/v1/messages/chutes", &request)
        .await
        .assert_status_ok();
    assert_eq!(harness.upstream.last_request_json().await["model"], "chutes/instant");

    request["model"] = json!("claude-3-opus-20240229");
    harness
        .post_messages("/v1/messages/chutes", &request)
        .await
        .assert_status_ok();
    assert_eq!(
        harness.upstream.last_request_json().await["model"],
        "chutes/family-default"
    );
}

#[tokio::test]
async fn test_unmapped_claude_model_uses_default_model() {
    let harness = TestHarness::new().await;
    harness
        .save(
            ProviderDefinition::new("Synthetic", harness.upstream.uri(), Dialect::OpenAi)
                .with_default_model("hf:zai-org/GLM-4.6"),
        )
        .await;
    harness.upstream.mock_chat_completion("ok", "x").await;

    harness
        .post_messages("/v1/messages/synthetic", &test_data::messages_request())
        .await
        .assert_status_ok();

    assert_eq!(
        harness.upstream.last_request_json().await["model"],
        "hf:zai-org/GLM-4.6"
    );
}

#[tokio::test]
async fn test_tool_calls_translate_both_ways() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness
        .upstream
        .mock_chat_completion_body(UpstreamData::tool_call_completion("openai/gpt-4o"))
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::tool_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["stop_reason"], "tool_use");
    assert_eq!(body["content"][0]["type"], "tool_use");
    assert_eq!(body["content"][0]["id"], "call_1");
    assert_eq!(body["content"][0]["name"], "get_weather");
    assert_eq!(body["content"][0]["input"], json!({"city": "Paris"}));

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["tools"][0]["type"], "function");
    assert_eq!(sent["tools"][0]["function"]["name"], "get_weather");
    assert_eq!(sent["tool_choice"], "auto");
}

#[tokio::test]
async fn test_canonical_dialect_passes_body_through() {
    let harness = TestHarness::new().await;
    harness.add_provider("Grok (Direct)", Dialect::Canonical).await;
    harness.upstream.mock_messages("Hi from grok", "grok-4").await;

    let request = test_data::messages_request_with_system("Be brief.");
    let response = harness
        .post_messages("/v1/messages/grok-direct", &request)
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        UpstreamData::canonical_message("Hi from grok", "grok-4")
    );

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["model"], "grok-4");
    assert_eq!(sent["system"], "Be brief.");
    assert_eq!(sent["messages"], request["messages"]);

    let requests = harness.upstream.requests().await;
    assert_eq!(
        requests[0]
            .headers
            .get("anthropic-version")
            .and_then(|v| v.to_str().ok()),
        Some("2023-06-01")
    );
}

#[tokio::test]
async fn test_custom_route_renders_prompt_template() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.enable_custom_prompt("You are {{system_name}}.").await;
    harness.upstream.mock_chat_completion("ok", "x").await;

    harness
        .post_messages("/v1/messages/openrouter-custom", &test_data::messages_request())
        .await
        .assert_status_ok();

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(
        sent["messages"][0],
        json!({"role": "system", "content": "You are Switchyard."})
    );
    assert_eq!(sent["messages"][1]["role"], "user");
}

#[tokio::test]
async fn test_standard_route_ignores_prompt_template() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.enable_custom_prompt("You are {{system_name}}.").await;
    harness.upstream.mock_chat_completion("ok", "x").await;

    harness
        .post_messages(
            "/v1/messages/openrouter",
            &test_data::messages_request_with_system("Caller system"),
        )
        .await
        .assert_status_ok();

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(
        sent["messages"][0],
        json!({"role": "system", "content": "Caller system"})
    );
}

#[tokio::test]
async fn test_empty_messages_are_forwarded() {
    let harness = TestHarness::new().await;
    harness.add_provider("Grok (Direct)", Dialect::Canonical).await;
    harness.upstream.mock_messages("nothing to say", "grok-4").await;

    let request = json!({
        "model": constants::CANONICAL_MODEL,
        "max_tokens": 10,
        "messages": []
    });
    harness
        .post_messages("/v1/messages/grok-direct", &request)
        .await
        .assert_status_ok();

    assert_eq!(harness.upstream.last_request_json().await["messages"], json!([]));
}

#[tokio::test]
async fn test_full_logging_records_request() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("logged", "openai/gpt-4o").await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();

    let records = harness.store.logged_requests();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.request_id.starts_with("req_"));
    assert_eq!(record.provider_name, "OpenRouter");
    assert_eq!(record.model_used, constants::CANONICAL_MODEL);
    assert_eq!(record.status_code, 200);
    assert!(record.response_data.contains("logged"));
    assert!(record.request_data.contains("Hello, how are you?"));
}

#[tokio::test]
async fn test_logger_failure_does_not_fail_the_call() {
    let logger = Arc::new(FailingLogger::default());
    let harness = TestHarness::with_logger(logger.clone()).await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("still delivered", "openai/gpt-4o").await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["type"], "message");
    assert_eq!(body["content"][0]["text"], "still delivered");
    assert_eq!(logger.attempts(), 1);
    assert!(harness.store.logged_requests().is_empty());
}

#[tokio::test]
async fn test_logging_disabled_records_nothing() {
    let harness = TestHarness::new().await;
    harness
        .update_settings(|s| s.enable_full_logging = false)
        .await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("quiet", "x").await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await
        .assert_status_ok();

    assert!(harness.store.logged_requests().is_empty());
}

#[tokio::test]
async fn test_sqlite_store_end_to_end() {
    let harness = TestHarness::sqlite().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness.upstream.mock_chat_completion("from sqlite", "openai/gpt-4o").await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::messages_request())
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["content"][0]["text"], "from sqlite");
    assert_eq!(harness.store.request_log_count().await.unwrap(), 1);
}
