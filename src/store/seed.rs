//! Default provider rows
//!
//! Inserts the built-in providers (inactive, no API key) when missing and
//! binds their default `claude-{key}` / `claude-{key}-custom` aliases.
//! Existing rows are never modified.

use tracing::{debug, info};

use super::{
    generate_default_alias, AliasKind, Dialect, ProviderDefinition, ProviderStore, StoreResult,
};
use crate::registry::ProviderRegistry;

const CLAUDE_HAIKU: &str = "claude-3-haiku-20240307";
const CLAUDE_SONNET: &str = "claude-3-5-sonnet-20241022";
const CLAUDE_OPUS: &str = "claude-3-opus-20240229";

struct SeedProvider {
    name: &'static str,
    endpoint: &'static str,
    dialect: Dialect,
    default_model: &'static str,
    /// Upstream models for haiku, sonnet and opus
    models: [&'static str; 3],
}

const DEFAULT_PROVIDERS: &[SeedProvider] = &[
    SeedProvider {
        name: "OpenRouter",
        endpoint: "https://openrouter.ai/api/v1",
        dialect: Dialect::OpenAi,
        default_model: "openai/gpt-3.5-turbo",
        models: ["openai/gpt-4o-mini", "openai/gpt-4o", "anthropic/claude-3-opus"],
    },
    SeedProvider {
        name: "Chutes",
        endpoint: "http://llm.chutes.ai/api/v1",
        dialect: Dialect::OpenAi,
        default_model: "chutes/default-model",
        models: ["chutes/glm-4.5", "chutes/kimi-k2", "chutes/deepseek"],
    },
    SeedProvider {
        name: "Synthetic",
        endpoint: "https://api.synthetic.new/v1",
        dialect: Dialect::OpenAi,
        default_model: "synthetic/default-model",
        models: ["synthetic/qwen-3-235b", "synthetic/glm-4.5", "synthetic/kimi-k2"],
    },
    SeedProvider {
        name: "AIML",
        endpoint: "https://api.aimlapi.com/v1",
        dialect: Dialect::OpenAi,
        default_model: "deepseek/deepseek-r1",
        models: ["deepseek/deepseek-r1", "anthropic/claude-4-sonnet", "google/gemini-2.5-pro"],
    },
    SeedProvider {
        name: "Grok (Direct)",
        endpoint: "https://api.x.ai/v1",
        dialect: Dialect::Canonical,
        default_model: "grok-4",
        models: ["grok-4", "grok-4", "grok-4"],
    },
    SeedProvider {
        name: "Grok (OpenAI)",
        endpoint: "https://api.x.ai/v1",
        dialect: Dialect::OpenAi,
        default_model: "grok-4",
        models: ["grok-4", "grok-4", "grok-4"],
    },
];

impl SeedProvider {
    fn definition(&self) -> ProviderDefinition {
        let [haiku, sonnet, opus] = self.models;
        ProviderDefinition::new(self.name, self.endpoint, self.dialect)
            .with_default_model(self.default_model)
            .with_mapping(CLAUDE_HAIKU, haiku)
            .with_mapping(CLAUDE_SONNET, sonnet)
            .with_mapping(CLAUDE_OPUS, opus)
    }
}

/// Insert missing default providers and their aliases
///
/// Returns the number of providers inserted.
pub async fn seed_default_providers(
    store: &dyn ProviderStore,
    registry: &ProviderRegistry,
) -> StoreResult<usize> {
    let mut inserted = 0;

    for seed in DEFAULT_PROVIDERS {
        let id = match store.get_provider(seed.name).await? {
            Some(existing) => {
                debug!(provider = %seed.name, "Default provider already present");
                existing.id
            }
            None => {
                inserted += 1;
                store.save_provider(&seed.definition()).await?
            }
        };

        let key = registry.normalize_provider_name(seed.name);
        let aliases = store.list_aliases().await?;
        for kind in [AliasKind::Standard, AliasKind::Custom] {
            if aliases.iter().any(|a| a.provider_id == id && a.kind == kind) {
                continue;
            }
            let alias = generate_default_alias(&key, kind);
            if aliases.iter().any(|a| a.alias.eq_ignore_ascii_case(&alias)) {
                continue;
            }
            store.set_alias(id, kind, &alias).await?;
        }
    }

    if inserted > 0 {
        info!(count = inserted, "Seeded default providers");
    }
    Ok(inserted)
}
