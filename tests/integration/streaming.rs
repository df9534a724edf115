//! Streaming integration tests
//!
//! Streamed replies are relayed byte-for-byte in upstream order. When
//! streaming is disabled in settings the call is served buffered instead.

use serde_json::Value;

use switchyard::store::Dialect;

use crate::common::{test_data, TestHarness};
use crate::mocks::{UpstreamData, CHAT_COMPLETIONS_PATH, MESSAGES_PATH};

#[tokio::test]
async fn test_stream_relays_every_chunk_in_order() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    let frames = UpstreamData::chat_stream_frames(5);
    harness
        .upstream
        .mock_event_stream(CHAT_COMPLETIONS_PATH, &frames)
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::streaming_request())
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), frames.concat());

    let content_type = response.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
    assert_eq!(response.header("cache-control"), "no-cache");

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["stream"], true);
}

#[tokio::test]
async fn test_stream_from_canonical_dialect() {
    let harness = TestHarness::new().await;
    harness.add_provider("Grok (Direct)", Dialect::Canonical).await;
    let frames = vec![
        "event: message_start\ndata: {\"type\":\"message_start\"}\n\n".to_string(),
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n".to_string(),
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n".to_string(),
    ];
    harness.upstream.mock_event_stream(MESSAGES_PATH, &frames).await;

    let response = harness
        .post_messages("/v1/messages/grok-direct", &test_data::streaming_request())
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), frames.concat());
}

#[tokio::test]
async fn test_streamed_calls_are_not_logged() {
    let harness = TestHarness::new().await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness
        .upstream
        .mock_event_stream(CHAT_COMPLETIONS_PATH, &UpstreamData::chat_stream_frames(2))
        .await;

    harness
        .post_messages("/v1/messages/openrouter", &test_data::streaming_request())
        .await
        .assert_status_ok();

    assert!(harness.store.logged_requests().is_empty());
}

#[tokio::test]
async fn test_streaming_disabled_serves_buffered_reply() {
    let harness = TestHarness::new().await;
    harness
        .update_settings(|s| s.enable_streaming = false)
        .await;
    harness.add_provider("OpenRouter", Dialect::OpenAi).await;
    harness
        .upstream
        .mock_chat_completion("buffered instead", "openai/gpt-4o")
        .await;

    let response = harness
        .post_messages("/v1/messages/openrouter", &test_data::streaming_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["content"][0]["text"], "buffered instead");

    let sent = harness.upstream.last_request_json().await;
    assert_eq!(sent["stream"], false);
}
