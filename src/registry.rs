//! Provider registry
//!
//! Maps a normalized provider key to a compiled-in adapter implementation.
//! Built once at startup from [`BUILTIN_ADAPTERS`] and read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::{AdapterConfig, AdapterRegistration, ProviderAdapter, BUILTIN_ADAPTERS};
use crate::store::{generate_default_alias, AliasKind, Dialect};

/// A registered adapter implementation under its normalized key
#[derive(Clone)]
pub struct RegisteredProvider {
    pub key: String,
    pub display_name: String,
    pub registration: AdapterRegistration,
}

impl RegisteredProvider {
    pub fn dialect(&self) -> Dialect {
        self.registration.dialect
    }

    /// Construct an adapter bound to a merged definition
    pub fn instantiate(&self, config: AdapterConfig) -> Arc<dyn ProviderAdapter> {
        (self.registration.constructor)(config)
    }
}

/// Public route advertised for one registered provider
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EndpointInfo {
    pub endpoint: String,
    pub description: String,
    pub provider: String,
    pub custom_prompt: bool,
}

/// Registry of compiled-in adapters, keyed by normalized provider key
pub struct ProviderRegistry {
    providers: BTreeMap<String, RegisteredProvider>,
}

/// Normalized key for a provider or implementation name
///
/// Lower-cased, parentheses dropped, whitespace and underscores turned into
/// hyphens, hyphen runs collapsed: `"Grok (Direct)"` -> `"grok-direct"`.
pub fn provider_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.trim().chars() {
        match c {
            '(' | ')' => {}
            c if c.is_whitespace() || c == '_' || c == '-' => {
                if !key.is_empty() && !key.ends_with('-') {
                    key.push('-');
                }
            }
            c => key.extend(c.to_lowercase()),
        }
    }
    key.trim_end_matches('-').to_string()
}

/// Title-cased display name from a key: `"chutes"` -> `"Chutes"`
fn display_name_from_key(key: &str) -> String {
    key.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl ProviderRegistry {
    /// Registry over the compiled-in adapter table
    pub fn discover() -> Self {
        Self::from_registrations(BUILTIN_ADAPTERS)
    }

    pub fn from_registrations(registrations: &[AdapterRegistration]) -> Self {
        let mut providers = BTreeMap::new();

        for registration in registrations {
            let key = provider_key(registration.name);
            let display_name = registration
                .display_name
                .map(str::to_string)
                .unwrap_or_else(|| display_name_from_key(&key));

            if providers.contains_key(&key) {
                warn!(key = %key, "Duplicate adapter registration ignored");
                continue;
            }

            providers.insert(
                key.clone(),
                RegisteredProvider {
                    key,
                    display_name,
                    registration: *registration,
                },
            );
        }

        if providers.is_empty() {
            warn!("No provider adapters registered; every provider lookup will fail");
        } else {
            info!(
                count = providers.len(),
                keys = ?providers.keys().collect::<Vec<_>>(),
                "Provider registry initialized"
            );
        }

        Self { providers }
    }

    /// Registry key for a provider name, or the input unchanged when unknown
    ///
    /// Matches registered keys and display names case-insensitively.
    pub fn normalize_provider_name(&self, name: &str) -> String {
        let key = provider_key(name);
        if self.providers.contains_key(&key) {
            return key;
        }

        self.providers
            .values()
            .find(|p| p.display_name.eq_ignore_ascii_case(name.trim()))
            .map(|p| p.key.clone())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get_provider_class(&self, key: &str) -> Option<&RegisteredProvider> {
        self.providers.get(key)
    }

    pub fn is_valid_provider(&self, name: &str) -> bool {
        self.providers
            .contains_key(&self.normalize_provider_name(name))
    }

    /// Standard and custom-prompt routes for one provider
    pub fn get_provider_endpoints(&self, name: &str) -> Option<Vec<EndpointInfo>> {
        let provider = self.providers.get(&self.normalize_provider_name(name))?;
        Some(endpoints_for(provider))
    }

    /// Routes for every registered provider, ordered by key
    pub fn get_all_endpoints(&self) -> Vec<EndpointInfo> {
        self.providers.values().flat_map(endpoints_for).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn endpoints_for(provider: &RegisteredProvider) -> Vec<EndpointInfo> {
    [AliasKind::Standard, AliasKind::Custom]
        .into_iter()
        .map(|kind| {
            let alias = generate_default_alias(&provider.key, kind);
            let custom_prompt = kind == AliasKind::Custom;
            EndpointInfo {
                endpoint: format!("/v1/messages/{alias}"),
                description: if custom_prompt {
                    format!("{} with custom system prompt", provider.display_name)
                } else {
                    format!("{} with standard prompt", provider.display_name)
                },
                provider: provider.display_name.clone(),
                custom_prompt,
            }
        })
        .collect()
}
