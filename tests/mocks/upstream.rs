//! Mock upstream provider for testing
//!
//! # Example
//!
//! ```rust,ignore
//! let upstream = MockUpstream::start().await;
//! upstream.mock_chat_completion("Hello!", "openai/gpt-4o").await;
//!
//! // Point a provider definition at upstream.uri()
//! ```

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Path OpenAI-dialect providers are called on
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
/// Path canonical-dialect providers are called on
pub const MESSAGES_PATH: &str = "/messages";

/// Mock upstream server wrapper
pub struct MockUpstream {
    server: MockServer,
}

impl MockUpstream {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to store as the provider's endpoint
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// OpenAI-dialect completion with a single text choice
    pub async fn mock_chat_completion(&self, content: &str, model: &str) {
        self.mock_chat_completion_body(UpstreamData::chat_completion(content, model))
            .await;
    }

    pub async fn mock_chat_completion_body(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(CHAT_COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Canonical-dialect reply with a single text block
    pub async fn mock_messages(&self, text: &str, model: &str) {
        Mock::given(method("POST"))
            .and(path(MESSAGES_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(UpstreamData::canonical_message(text, model)),
            )
            .mount(&self.server)
            .await;
    }

    /// Event stream made of the given frames, in order
    pub async fn mock_event_stream(&self, at: &str, frames: &[String]) {
        let body: String = frames.concat();
        Mock::given(method("POST"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&self.server)
            .await;
    }

    /// Non-200 reply with an arbitrary body and content type
    pub async fn mock_error(&self, at: &str, status: u16, body: &str, content_type: &str) {
        Mock::given(method("POST"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_string(), content_type))
            .mount(&self.server)
            .await;
    }

    /// 200 reply whose body is not JSON
    pub async fn mock_garbage(&self, at: &str) {
        Mock::given(method("POST"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>oops</html>", "text/html"))
            .mount(&self.server)
            .await;
    }

    /// Every request the upstream received so far
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// JSON body of the most recent request
    pub async fn last_request_json(&self) -> Value {
        let requests = self.requests().await;
        let request = requests.last().expect("upstream received no request");
        serde_json::from_slice(&request.body).expect("upstream request body is not JSON")
    }
}

/// Canned upstream payloads
pub struct UpstreamData;

impl UpstreamData {
    pub fn chat_completion(content: &str, model: &str) -> Value {
        json!({
            "id": "chatcmpl-test123",
            "object": "chat.completion",
            "created": 1706745600,
            "model": model,
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        })
    }

    pub fn tool_call_completion(model: &str) -> Value {
        json!({
            "id": "chatcmpl-tools",
            "object": "chat.completion",
            "model": model,
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "get_weather",
                                    "arguments": "{\"city\":\"Paris\"}"
                                }
                            }
                        ]
                    },
                    "finish_reason": "tool_calls"
                }
            ],
            "usage": {"prompt_tokens": 30, "completion_tokens": 11}
        })
    }

    pub fn canonical_message(text: &str, model: &str) -> Value {
        json!({
            "id": "msg_upstream_1",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 9, "output_tokens": 4}
        })
    }

    /// `n` OpenAI-style delta frames followed by the terminator
    pub fn chat_stream_frames(n: usize) -> Vec<String> {
        let mut frames: Vec<String> = (0..n)
            .map(|i| {
                format!(
                    "data: {}\n\n",
                    json!({
                        "id": "chatcmpl-stream",
                        "object": "chat.completion.chunk",
                        "choices": [{"index": 0, "delta": {"content": format!("part-{i}")}}]
                    })
                )
            })
            .collect();
        frames.push("data: [DONE]\n\n".to_string());
        frames
    }
}
