//! Provider adapters
//!
//! An adapter binds one upstream provider family to its dialect: it turns a
//! canonical request into the upstream shape, performs the HTTP call and turns
//! the reply back into canonical form. Two families exist:
//!
//! - [`CanonicalAdapter`] forwards the canonical shape nearly unchanged
//! - [`OpenAiAdapter`] translates to and from `/chat/completions`
//!
//! The compiled-in registration table is [`BUILTIN_ADAPTERS`].

pub mod canonical;
pub mod http;
pub mod openai;
pub mod prompt;
pub mod translate;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;

use crate::resolver::lookup_model_mapping;
use crate::store::{Dialect, PromptConfig, ProviderDefinition};

pub use canonical::CanonicalAdapter;
pub use http::UpstreamClient;
pub use openai::OpenAiAdapter;

/// Stream type for raw upstream response bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Default absolute timeout for one upstream call
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised inside an adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Request translation failed: {0}")]
    Translation(String),

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Error sending request to {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed arguments for tool call '{tool}': {reason}")]
    MalformedToolArguments { tool: String, reason: String },

    #[error("Unexpected upstream response: {0}")]
    UnexpectedResponse(String),
}

/// Everything an adapter constructor needs
#[derive(Clone)]
pub struct AdapterConfig {
    /// Definition with predefined headers and default mappings already merged
    pub definition: ProviderDefinition,
    pub client: reqwest::Client,
    pub timeout: Duration,
}

/// Polymorphic adapter contract
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, for logs and error context
    fn name(&self) -> &str;

    fn dialect(&self) -> Dialect;

    /// Convert a validated canonical body into the upstream request. No I/O.
    ///
    /// `prompt` is only passed in custom-prompt mode with a template enabled.
    fn prepare_request(
        &self,
        request: &Value,
        prompt: Option<&PromptConfig>,
    ) -> Result<Value, AdapterError>;

    /// POST the prepared request to the dialect endpoint
    async fn send_request(
        &self,
        request: &Value,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError>;

    /// Convert a parsed upstream body into a canonical response body
    fn process_response(&self, response: Value) -> Result<Value, AdapterError>;

    /// Hand back the upstream body as raw bytes
    ///
    /// Both families relay the provider's native stream framing unchanged.
    fn process_stream_response(&self, response: reqwest::Response) -> ByteStream {
        Box::pin(response.bytes_stream())
    }

    /// Send a minimal request and report whether the upstream answered 200
    async fn test_connection(&self) -> bool;

    /// Authentication headers derived from the definition's auth method
    fn auth_headers(&self) -> Result<HeaderMap, AdapterError>;
}

/// How an adapter picks the upstream model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPolicy {
    /// Model mapping, then the default model for canonical-family names
    Mapped,
    /// Model mapping, then this fixed model for canonical-family names
    ReplaceForeign(&'static str),
    /// Always this model (or the definition's default model when set)
    Pinned(&'static str),
}

/// Static per-family behavior
#[derive(Debug, Clone, Copy)]
pub struct AdapterFamily {
    /// Base URL used when the definition leaves the endpoint empty
    pub default_endpoint: &'static str,
    pub model_policy: ModelPolicy,
    /// Model used by `test_connection` when the definition has none
    pub test_model: &'static str,
}

impl AdapterFamily {
    /// Upstream model for a requested canonical model name
    pub fn select_model(&self, definition: &ProviderDefinition, requested: &str) -> String {
        let default_model = definition.default_model.as_deref().filter(|m| !m.is_empty());

        match self.model_policy {
            ModelPolicy::Pinned(fixed) => default_model.unwrap_or(fixed).to_string(),
            ModelPolicy::ReplaceForeign(fixed) => {
                if let Some(mapped) = lookup_model_mapping(&definition.model_mapping, requested) {
                    mapped
                } else if is_foreign_model(requested) {
                    default_model.unwrap_or(fixed).to_string()
                } else {
                    requested.to_string()
                }
            }
            ModelPolicy::Mapped => {
                if let Some(mapped) = lookup_model_mapping(&definition.model_mapping, requested) {
                    mapped
                } else if is_foreign_model(requested) {
                    default_model.unwrap_or(requested).to_string()
                } else {
                    requested.to_string()
                }
            }
        }
    }

    /// Model used by `test_connection`
    pub fn test_model_for(&self, definition: &ProviderDefinition) -> String {
        match definition.default_model.as_deref().filter(|m| !m.is_empty()) {
            Some(model) => model.to_string(),
            None => match self.model_policy {
                ModelPolicy::Pinned(fixed) | ModelPolicy::ReplaceForeign(fixed) => fixed.to_string(),
                ModelPolicy::Mapped => self.test_model.to_string(),
            },
        }
    }
}

/// Constructor stored in the registry
pub type AdapterConstructor = fn(AdapterConfig) -> Arc<dyn ProviderAdapter>;

/// One compiled-in adapter implementation
#[derive(Clone, Copy)]
pub struct AdapterRegistration {
    /// Implementation name the registry key is derived from
    pub name: &'static str,
    /// Hand-mapped display name; `None` derives it from the key
    pub display_name: Option<&'static str>,
    pub dialect: Dialect,
    pub constructor: AdapterConstructor,
    /// Mappings applied underneath the stored ones
    pub default_model_mapping: &'static [(&'static str, &'static str)],
}

pub const GROK_DIRECT: AdapterFamily = AdapterFamily {
    default_endpoint: "https://api.x.ai/v1",
    model_policy: ModelPolicy::ReplaceForeign("grok-4"),
    test_model: "grok-4",
};

pub const GROK_OPENAI: AdapterFamily = AdapterFamily {
    default_endpoint: "https://api.x.ai/v1",
    model_policy: ModelPolicy::Pinned("grok-4"),
    test_model: "grok-4",
};

pub const OPENROUTER: AdapterFamily = AdapterFamily {
    default_endpoint: "https://openrouter.ai/api/v1",
    model_policy: ModelPolicy::Mapped,
    test_model: "openai/gpt-3.5-turbo",
};

pub const CHUTES: AdapterFamily = AdapterFamily {
    default_endpoint: "http://llm.chutes.ai/api/v1",
    model_policy: ModelPolicy::Mapped,
    test_model: "chutes/default-model",
};

pub const SYNTHETIC: AdapterFamily = AdapterFamily {
    default_endpoint: "https://api.synthetic.new/v1",
    model_policy: ModelPolicy::Mapped,
    test_model: "synthetic/default-model",
};

pub const AIML: AdapterFamily = AdapterFamily {
    default_endpoint: "https://api.aimlapi.com/v1",
    model_policy: ModelPolicy::Mapped,
    test_model: "deepseek/deepseek-r1",
};

fn grok_direct(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(CanonicalAdapter::new(config, GROK_DIRECT))
}

fn grok_openai(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiAdapter::new(config, GROK_OPENAI))
}

fn openrouter(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiAdapter::new(config, OPENROUTER))
}

fn chutes(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiAdapter::new(config, CHUTES))
}

fn synthetic(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiAdapter::new(config, SYNTHETIC))
}

fn aiml(config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
    Arc::new(OpenAiAdapter::new(config, AIML))
}

/// Compiled-in adapter implementations
pub const BUILTIN_ADAPTERS: &[AdapterRegistration] = &[
    AdapterRegistration {
        name: "grok_direct",
        display_name: Some("Grok (Direct)"),
        dialect: Dialect::Canonical,
        constructor: grok_direct,
        default_model_mapping: &[],
    },
    AdapterRegistration {
        name: "grok_openai",
        display_name: Some("Grok (OpenAI)"),
        dialect: Dialect::OpenAi,
        constructor: grok_openai,
        default_model_mapping: &[],
    },
    AdapterRegistration {
        name: "openrouter",
        display_name: Some("OpenRouter"),
        dialect: Dialect::OpenAi,
        constructor: openrouter,
        default_model_mapping: &[
            ("claude-3-haiku-20240307", "openai/gpt-4o-mini"),
            ("claude-3-5-sonnet-20241022", "openai/gpt-4o"),
            ("claude-3-opus-20240229", "anthropic/claude-3-opus"),
        ],
    },
    AdapterRegistration {
        name: "chutes",
        display_name: None,
        dialect: Dialect::OpenAi,
        constructor: chutes,
        default_model_mapping: &[],
    },
    AdapterRegistration {
        name: "synthetic",
        display_name: None,
        dialect: Dialect::OpenAi,
        constructor: synthetic,
        default_model_mapping: &[],
    },
    AdapterRegistration {
        name: "aiml",
        display_name: Some("AIML"),
        dialect: Dialect::OpenAi,
        constructor: aiml,
        default_model_mapping: &[],
    },
];

/// True for model names of the canonical (caller-side) family
pub fn is_foreign_model(model: &str) -> bool {
    model.to_ascii_lowercase().contains("claude")
}
