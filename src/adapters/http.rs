//! Upstream HTTP plumbing shared by all adapters
//!
//! Builds the URL from the definition's endpoint and the dialect suffix,
//! attaches authentication and custom headers, and applies the single
//! absolute timeout. Nothing here retries.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use super::{AdapterConfig, AdapterError};
use crate::store::{AuthMethod, Dialect, ProviderDefinition};

/// HTTP client bound to one provider definition
pub struct UpstreamClient {
    client: reqwest::Client,
    definition: ProviderDefinition,
    dialect: Dialect,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    /// `default_endpoint` is used when the definition has no endpoint
    pub fn new(config: AdapterConfig, dialect: Dialect, default_endpoint: &str) -> Self {
        let configured = config.definition.api_endpoint.trim();
        let base_url = if configured.is_empty() {
            default_endpoint
        } else {
            configured
        }
        .trim_end_matches('/')
        .to_string();

        Self {
            client: config.client,
            definition: config.definition,
            dialect,
            base_url,
            timeout: config.timeout,
        }
    }

    pub fn definition(&self) -> &ProviderDefinition {
        &self.definition
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.dialect.path_suffix())
    }

    /// Authentication headers for the definition's auth method
    pub fn auth_headers(&self) -> Result<HeaderMap, AdapterError> {
        let mut headers = HeaderMap::new();
        let value = match self.definition.auth_method {
            AuthMethod::BearerToken => format!("Bearer {}", self.definition.api_key),
            AuthMethod::BasicAuth => format!("Basic {}", STANDARD.encode(&self.definition.api_key)),
            // Expected among the definition's custom headers.
            AuthMethod::CustomHeader => return Ok(headers),
        };

        let value = HeaderValue::from_str(&value).map_err(|e| AdapterError::InvalidHeader {
            name: AUTHORIZATION.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Content type, auth headers, then custom headers (custom headers win)
    pub fn request_headers(&self) -> Result<HeaderMap, AdapterError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(self.auth_headers()?);

        for (name, value) in &self.definition.headers {
            if value.is_empty() {
                continue;
            }
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| AdapterError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| AdapterError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    /// POST a JSON body to the dialect endpoint
    ///
    /// When `stream` is false the body is still read by the caller; reqwest
    /// never buffers it here either way.
    #[instrument(skip_all, fields(provider = %self.definition.name, stream = %stream))]
    pub async fn post(&self, body: &Value, stream: bool) -> Result<reqwest::Response, AdapterError> {
        let url = self.url();
        let headers = self.request_headers()?;

        debug!(url = %url, header_count = headers.len(), "Sending request to upstream");

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Failed to send request to upstream");
                AdapterError::Transport {
                    provider: self.definition.name.clone(),
                    source: e,
                }
            })?;

        info!(
            url = %url,
            status = %response.status(),
            content_length = ?response.content_length(),
            "Response received from upstream"
        );

        Ok(response)
    }

    /// Connection test: one "Hello" turn, `max_tokens` 10, success iff HTTP 200
    pub async fn check_connection(&self, model: &str) -> bool {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 10
        });

        match self.post(&body, false).await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                warn!(provider = %self.definition.name, error = %e, "Connection test failed");
                false
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}
