//! Per-request logging context
//!
//! Carries the request id, provider, model and timing through one proxied
//! call so every log line for it can be correlated.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn, Span};

/// Context for tracking a request through the pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// `req_<yyyymmddHHMMSSmmm>`
    pub request_id: String,
    pub start_time: Instant,
    /// Provider name, empty until resolved
    pub provider: String,
    /// Inbound path
    pub endpoint: String,
    /// Model requested by the caller
    pub model: Option<String>,
    pub streaming: bool,
    pub custom_prompt: bool,
}

/// Request id in the `req_<timestamp>` format
pub fn generate_request_id() -> String {
    format!("req_{}", Utc::now().format("%Y%m%d%H%M%S%3f"))
}

impl RequestContext {
    pub fn new(endpoint: &str) -> Self {
        Self {
            request_id: generate_request_id(),
            start_time: Instant::now(),
            provider: String::new(),
            endpoint: endpoint.to_string(),
            model: None,
            streaming: false,
            custom_prompt: false,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_custom_prompt(mut self, custom_prompt: bool) -> Self {
        self.custom_prompt = custom_prompt;
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn log_request_start(&self) {
        info!(
            request_id = %self.request_id,
            provider = %self.provider,
            endpoint = %self.endpoint,
            model = ?self.model,
            streaming = %self.streaming,
            custom_prompt = %self.custom_prompt,
            "Request started"
        );
    }

    pub fn log_upstream_model(&self, upstream_model: &str) {
        debug!(
            request_id = %self.request_id,
            provider = %self.provider,
            requested = ?self.model,
            upstream_model = %upstream_model,
            "Prepared upstream request"
        );
    }

    /// Upstream answered with a non-200 status that is relayed as-is
    pub fn log_upstream_status(&self, status: u16) {
        warn!(
            request_id = %self.request_id,
            provider = %self.provider,
            status = %status,
            elapsed_ms = %self.elapsed_ms(),
            "Upstream returned an error status; relaying verbatim"
        );
    }

    pub fn log_request_complete(&self, status: u16) {
        info!(
            request_id = %self.request_id,
            provider = %self.provider,
            endpoint = %self.endpoint,
            model = ?self.model,
            streaming = %self.streaming,
            status = %status,
            elapsed_ms = %self.elapsed_ms(),
            "Request completed"
        );
    }

    pub fn log_stream_started(&self) {
        info!(
            request_id = %self.request_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response started"
        );
    }

    pub fn log_stream_ended(&self, chunks: usize) {
        info!(
            request_id = %self.request_id,
            provider = %self.provider,
            chunks = %chunks,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response ended"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            message = %message,
            "Warning during request"
        );
    }

    pub fn log_error(&self, code: &str, error: &str) {
        error!(
            request_id = %self.request_id,
            provider = %self.provider,
            endpoint = %self.endpoint,
            model = ?self.model,
            streaming = %self.streaming,
            elapsed_ms = %self.elapsed_ms(),
            code = %code,
            error = %error,
            "Request failed"
        );
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "proxy_request",
            request_id = %self.request_id,
            endpoint = %self.endpoint,
        )
    }
}
