//! Pass-through adapter for upstreams that speak the canonical dialect
//!
//! The request body is forwarded as-is apart from the model identifier and,
//! in custom-prompt mode, the system text. Replies are returned untouched.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use super::prompt::render_system_prompt;
use super::{AdapterConfig, AdapterError, AdapterFamily, ProviderAdapter, UpstreamClient};
use crate::canonical::SystemPrompt;
use crate::store::{Dialect, PromptConfig};

pub struct CanonicalAdapter {
    upstream: UpstreamClient,
    family: AdapterFamily,
}

impl CanonicalAdapter {
    pub fn new(config: AdapterConfig, family: AdapterFamily) -> Self {
        Self {
            upstream: UpstreamClient::new(config, Dialect::Canonical, family.default_endpoint),
            family,
        }
    }
}

#[async_trait]
impl ProviderAdapter for CanonicalAdapter {
    fn name(&self) -> &str {
        &self.upstream.definition().name
    }

    fn dialect(&self) -> Dialect {
        Dialect::Canonical
    }

    fn prepare_request(
        &self,
        request: &Value,
        prompt: Option<&PromptConfig>,
    ) -> Result<Value, AdapterError> {
        let mut body = request.clone();
        let object = body
            .as_object_mut()
            .ok_or_else(|| AdapterError::Translation("request body is not an object".to_string()))?;

        let requested = object
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let model = self.family.select_model(self.upstream.definition(), &requested);
        if model != requested {
            debug!(provider = %self.name(), from = %requested, to = %model, "Rewrote model");
        }
        object.insert("model".to_string(), Value::String(model.clone()));

        if let Some(prompt) = prompt {
            let original = object
                .get("system")
                .cloned()
                .map(serde_json::from_value::<SystemPrompt>)
                .transpose()
                .map_err(|e| AdapterError::Translation(format!("invalid system field: {e}")))?
                .map(|system| system.as_text());

            if let Some(system) = render_system_prompt(original.as_deref(), prompt, &model) {
                object.insert("system".to_string(), Value::String(system));
            }
        }

        Ok(body)
    }

    async fn send_request(
        &self,
        request: &Value,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        self.upstream.post(request, stream).await
    }

    fn process_response(&self, response: Value) -> Result<Value, AdapterError> {
        if response.is_object() {
            Ok(response)
        } else {
            Err(AdapterError::UnexpectedResponse(
                "expected a JSON object".to_string(),
            ))
        }
    }

    async fn test_connection(&self) -> bool {
        let model = self.family.test_model_for(self.upstream.definition());
        self.upstream.check_connection(&model).await
    }

    fn auth_headers(&self) -> Result<HeaderMap, AdapterError> {
        self.upstream.auth_headers()
    }
}
