//! Adapter for upstreams that speak OpenAI `/chat/completions`

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use super::prompt::render_system_prompt;
use super::translate::{from_openai_response, to_openai_request};
use super::{AdapterConfig, AdapterError, AdapterFamily, ProviderAdapter, UpstreamClient};
use crate::canonical::CanonicalRequest;
use crate::store::{Dialect, PromptConfig};

pub struct OpenAiAdapter {
    upstream: UpstreamClient,
    family: AdapterFamily,
}

impl OpenAiAdapter {
    pub fn new(config: AdapterConfig, family: AdapterFamily) -> Self {
        Self {
            upstream: UpstreamClient::new(config, Dialect::OpenAi, family.default_endpoint),
            family,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.upstream.definition().name
    }

    fn dialect(&self) -> Dialect {
        Dialect::OpenAi
    }

    fn prepare_request(
        &self,
        request: &Value,
        prompt: Option<&PromptConfig>,
    ) -> Result<Value, AdapterError> {
        let canonical: CanonicalRequest = serde_json::from_value(request.clone())
            .map_err(|e| AdapterError::Translation(e.to_string()))?;

        let model = self
            .family
            .select_model(self.upstream.definition(), &canonical.model);
        debug!(provider = %self.name(), from = %canonical.model, to = %model, "Selected upstream model");

        let original = canonical.system.as_ref().map(|s| s.as_text());
        let system = match prompt {
            Some(prompt) => render_system_prompt(original.as_deref(), prompt, &model),
            None => original,
        };

        to_openai_request(&canonical, &model, system.as_deref())
    }

    async fn send_request(
        &self,
        request: &Value,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        self.upstream.post(request, stream).await
    }

    fn process_response(&self, response: Value) -> Result<Value, AdapterError> {
        let fallback_model = self
            .upstream
            .definition()
            .default_model
            .clone()
            .unwrap_or_default();
        let canonical = from_openai_response(&response, &fallback_model)?;
        serde_json::to_value(canonical).map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))
    }

    async fn test_connection(&self) -> bool {
        let model = self.family.test_model_for(self.upstream.definition());
        self.upstream.check_connection(&model).await
    }

    fn auth_headers(&self) -> Result<HeaderMap, AdapterError> {
        self.upstream.auth_headers()
    }
}
