//! Provider definition store
//!
//! Provides a narrow record-store interface for provider definitions, command
//! aliases, application settings and request logs. The SQLite implementation
//! is used in production; the in-memory one backs unit tests.

pub mod memory;
pub mod pool;
pub mod seed;
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryStore;
pub use pool::{PooledConnection, SqlitePool};
pub use sqlite::SqliteStore;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How credentials are attached to upstream requests
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    BearerToken,
    BasicAuth,
    CustomHeader,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::BearerToken => "bearer_token",
            AuthMethod::BasicAuth => "basic_auth",
            AuthMethod::CustomHeader => "custom_header",
        }
    }

    pub fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "bearer_token" => Ok(AuthMethod::BearerToken),
            "basic_auth" => Ok(AuthMethod::BasicAuth),
            "custom_header" => Ok(AuthMethod::CustomHeader),
            other => Err(StoreError::InvalidValue(format!("unknown auth method '{other}'"))),
        }
    }
}

/// API dialect spoken by an upstream provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// The same Anthropic Messages shape callers speak
    #[default]
    #[serde(rename = "anthropic", alias = "canonical")]
    Canonical,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Canonical => "anthropic",
            Dialect::OpenAi => "openai",
        }
    }

    pub fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "anthropic" | "canonical" => Ok(Dialect::Canonical),
            "openai" => Ok(Dialect::OpenAi),
            other => Err(StoreError::InvalidValue(format!("unknown api standard '{other}'"))),
        }
    }

    /// Path appended to the provider's base URL
    pub fn path_suffix(&self) -> &'static str {
        match self {
            Dialect::Canonical => "/messages",
            Dialect::OpenAi => "/chat/completions",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured upstream provider
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderDefinition {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub api_endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub api_standard: Dialect,
    #[serde(default)]
    pub model_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub is_active: bool,
}

// Keeps the credential out of logs.
impl fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .field("auth_method", &self.auth_method)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("api_standard", &self.api_standard)
            .field("model_mapping", &self.model_mapping)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl ProviderDefinition {
    pub fn new(name: impl Into<String>, api_endpoint: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            id: 0,
            name: name.into(),
            api_endpoint: api_endpoint.into(),
            api_key: String::new(),
            default_model: None,
            auth_method: AuthMethod::BearerToken,
            headers: BTreeMap::new(),
            api_standard: dialect,
            model_mapping: BTreeMap::new(),
            is_active: false,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.model_mapping.insert(from.into(), to.into());
        self
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// Prompt mode bound to an alias
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
    Standard,
    Custom,
}

impl AliasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasKind::Standard => "standard",
            AliasKind::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "standard" => Ok(AliasKind::Standard),
            "custom" => Ok(AliasKind::Custom),
            other => Err(StoreError::InvalidValue(format!("unknown alias type '{other}'"))),
        }
    }
}

/// Short routing token bound to a provider and prompt mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandAlias {
    pub provider_id: i64,
    pub kind: AliasKind,
    pub alias: String,
    pub is_active: bool,
}

/// Runtime behavior settings (single row)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub server_host: String,
    pub server_port: u16,
    pub enable_full_logging: bool,
    pub enable_streaming: bool,
    pub request_timeout: u64,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            enable_full_logging: true,
            enable_streaming: true,
            request_timeout: 300,
            rate_limit_enabled: true,
            rate_limit_requests: 100,
            rate_limit_window: 3600,
        }
    }
}

/// Operator-configured system prompt used in custom-prompt mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    pub use_custom_prompt: bool,
    pub prompt_template: Option<String>,
    pub system_name: String,
    pub model_name_override: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            use_custom_prompt: false,
            prompt_template: None,
            system_name: "AI Assistant".to_string(),
            model_name_override: None,
        }
    }
}

/// One completed proxy call, persisted when full logging is enabled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestRecord {
    pub request_id: String,
    pub provider_name: String,
    /// Model the caller asked for, before any mapping
    pub model_used: String,
    pub request_data: String,
    pub response_data: String,
    pub status_code: u16,
    pub duration_ms: u64,
}

/// Read/write access to provider configuration
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Case-insensitive lookup by provider name
    async fn get_provider(&self, name: &str) -> StoreResult<Option<ProviderDefinition>>;

    async fn get_provider_by_id(&self, id: i64) -> StoreResult<Option<ProviderDefinition>>;

    async fn list_providers(&self) -> StoreResult<Vec<ProviderDefinition>>;

    /// Insert or update by name; returns the provider id
    async fn save_provider(&self, provider: &ProviderDefinition) -> StoreResult<i64>;

    /// Mark one provider active and every other inactive
    async fn set_active_provider(&self, name: &str) -> StoreResult<bool>;

    async fn get_alias(&self, alias: &str) -> StoreResult<Option<CommandAlias>>;

    async fn list_aliases(&self) -> StoreResult<Vec<CommandAlias>>;

    /// Bind an alias, replacing any existing one for the same (provider, kind)
    async fn set_alias(&self, provider_id: i64, kind: AliasKind, alias: &str) -> StoreResult<()>;

    async fn remove_alias(&self, provider_id: i64, kind: AliasKind) -> StoreResult<bool>;

    async fn get_app_settings(&self) -> StoreResult<AppSettings>;

    async fn save_app_settings(&self, settings: &AppSettings) -> StoreResult<()>;

    async fn get_prompt_config(&self) -> StoreResult<PromptConfig>;

    async fn save_prompt_config(&self, config: &PromptConfig) -> StoreResult<()>;
}

/// Sink for completed request records
#[async_trait]
pub trait RequestLogger: Send + Sync {
    async fn log_request(&self, record: &RequestRecord) -> StoreResult<()>;
}

/// Default alias token for a normalized provider key
pub fn generate_default_alias(provider_key: &str, kind: AliasKind) -> String {
    match kind {
        AliasKind::Standard => format!("claude-{provider_key}"),
        AliasKind::Custom => format!("claude-{provider_key}-custom"),
    }
}
