//! Dynamic provider resolution
//!
//! Loads a stored provider definition, merges it with the adapter defaults
//! (predefined headers, default model mappings) and builds an adapter for it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapters::{AdapterConfig, ProviderAdapter, DEFAULT_UPSTREAM_TIMEOUT};
use crate::error::{AppError, AppResult};
use crate::registry::{EndpointInfo, ProviderRegistry};
use crate::store::{Dialect, ProviderDefinition, ProviderStore};

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_]+").expect("separator regex is valid"));

fn normalize_model_name(name: &str) -> String {
    SEPARATORS.replace_all(&name.trim().to_lowercase(), "-").into_owned()
}

/// Look a model name up in a mapping
///
/// Tries, in order: the exact key; the key equal after lower-casing and
/// turning whitespace/underscores into hyphens; a key equal to the family
/// token before the first hyphen of the normalized name.
pub fn lookup_model_mapping(mapping: &BTreeMap<String, String>, model: &str) -> Option<String> {
    if let Some(target) = mapping.get(model) {
        return Some(target.clone());
    }

    let normalized = normalize_model_name(model);
    if let Some((_, target)) = mapping
        .iter()
        .find(|(key, _)| normalize_model_name(key) == normalized)
    {
        return Some(target.clone());
    }

    let family = normalized.split('-').next().filter(|f| !f.is_empty())?;
    mapping
        .iter()
        .find(|(key, _)| normalize_model_name(key) == family)
        .map(|(_, target)| target.clone())
}

/// Headers every provider of a dialect receives unless overridden
pub fn predefined_headers(dialect: Dialect) -> BTreeMap<String, String> {
    let pairs: &[(&str, &str)] = match dialect {
        Dialect::Canonical => &[("anthropic-version", "2023-06-01")],
        // Placeholders; empty values are never sent.
        Dialect::OpenAi => &[("OpenAI-Organization", ""), ("OpenAI-Project", "")],
    };
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A stored provider joined with its registry information
#[derive(Debug, Clone, Serialize)]
pub struct AvailableProvider {
    pub name: String,
    pub key: String,
    pub api_standard: Dialect,
    pub is_active: bool,
    pub is_valid: bool,
    pub endpoints: Vec<EndpointInfo>,
}

/// Resolves provider names to ready-to-use adapters
pub struct ProviderResolver {
    store: Arc<dyn ProviderStore>,
    registry: Arc<ProviderRegistry>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ProviderResolver {
    pub fn new(store: Arc<dyn ProviderStore>, registry: Arc<ProviderRegistry>, client: reqwest::Client) -> Self {
        Self {
            store,
            registry,
            client,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Override the per-call upstream timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Load a provider by name, by display name or by registry key
    pub async fn get_provider_by_name(&self, name: &str) -> AppResult<ProviderDefinition> {
        if let Some(definition) = self.store.get_provider(name).await? {
            return Ok(definition);
        }

        // "grok-direct" must find the row stored as "Grok (Direct)".
        let key = self.registry.normalize_provider_name(name);
        let wanted = key.to_lowercase();
        let found = self
            .store
            .list_providers()
            .await?
            .into_iter()
            .find(|p| self.registry.normalize_provider_name(&p.name).to_lowercase() == wanted);

        found.ok_or_else(|| AppError::ProviderNotFound(name.to_string()))
    }

    /// Merge adapter defaults into the definition and build its adapter
    pub fn create_provider_instance(
        &self,
        definition: &ProviderDefinition,
    ) -> AppResult<Arc<dyn ProviderAdapter>> {
        let key = self.registry.normalize_provider_name(&definition.name);
        let provider = self
            .registry
            .get_provider_class(&key)
            .ok_or_else(|| AppError::Provider {
                provider: definition.name.clone(),
                message: format!("no adapter registered for '{key}'"),
            })?;

        if definition.api_standard != provider.dialect() {
            warn!(
                provider = %definition.name,
                stored = %definition.api_standard,
                adapter = %provider.dialect(),
                "Stored api standard disagrees with adapter; using adapter dialect"
            );
        }

        let mut merged = definition.clone();
        merged.api_standard = provider.dialect();

        let mut headers = predefined_headers(provider.dialect());
        headers.extend(definition.headers.clone());
        merged.headers = headers;

        let mut mapping: BTreeMap<String, String> = provider
            .registration
            .default_model_mapping
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        mapping.extend(definition.model_mapping.clone());
        merged.model_mapping = mapping;

        debug!(provider = %merged.name, key = %key, "Creating adapter instance");

        Ok(provider.instantiate(AdapterConfig {
            definition: merged,
            client: self.client.clone(),
            timeout: self.timeout,
        }))
    }

    /// Mapped upstream model for a provider, if any
    pub async fn get_model_mapping(
        &self,
        provider_name: &str,
        model_name: &str,
    ) -> AppResult<Option<String>> {
        let definition = self.get_provider_by_name(provider_name).await?;
        Ok(lookup_model_mapping(&definition.model_mapping, model_name))
    }

    /// Predefined headers for a provider's dialect
    pub async fn get_predefined_headers(
        &self,
        provider_name: &str,
    ) -> AppResult<BTreeMap<String, String>> {
        let key = self.registry.normalize_provider_name(provider_name);
        if let Some(provider) = self.registry.get_provider_class(&key) {
            return Ok(predefined_headers(provider.dialect()));
        }
        let definition = self.get_provider_by_name(provider_name).await?;
        Ok(predefined_headers(definition.api_standard))
    }

    /// Every stored provider with its registry endpoints
    pub async fn get_available_providers(&self) -> AppResult<Vec<AvailableProvider>> {
        let providers = self.store.list_providers().await?;
        Ok(providers
            .into_iter()
            .map(|p| {
                let key = self.registry.normalize_provider_name(&p.name);
                let endpoints = self.registry.get_provider_endpoints(&key).unwrap_or_default();
                AvailableProvider {
                    is_valid: !endpoints.is_empty(),
                    name: p.name,
                    key,
                    api_standard: p.api_standard,
                    is_active: p.is_active,
                    endpoints,
                }
            })
            .collect())
    }

    /// The active provider; the first by name when several are flagged
    pub async fn get_active_provider(&self) -> AppResult<ProviderDefinition> {
        let mut active: Vec<_> = self
            .store
            .list_providers()
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();

        if active.len() > 1 {
            warn!(
                count = active.len(),
                chosen = %active[0].name,
                "Several providers are marked active"
            );
        }

        if active.is_empty() {
            return Err(AppError::ProviderNotFound("no active provider".to_string()));
        }
        Ok(active.swap_remove(0))
    }
}
