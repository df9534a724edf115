//! Path token to provider routing
//!
//! A token is first looked up as a command alias. Unknown tokens are treated
//! as literal provider names, where a trailing `-custom` selects custom-prompt
//! mode.

use tracing::{debug, warn};

use crate::error::AppResult;
use crate::resolver::ProviderResolver;
use crate::store::{AliasKind, ProviderDefinition, ProviderStore};

const CUSTOM_SUFFIX: &str = "-custom";

/// Where a request goes and in which prompt mode
#[derive(Debug, Clone)]
pub struct Route {
    pub definition: ProviderDefinition,
    pub custom_prompt: bool,
    /// Alias that matched, if routing went through one
    pub alias: Option<String>,
}

/// Split a literal token into provider name and custom-prompt flag
pub fn split_custom_suffix(token: &str) -> (&str, bool) {
    let len = token.len();
    if len > CUSTOM_SUFFIX.len()
        && token.is_char_boundary(len - CUSTOM_SUFFIX.len())
        && token[len - CUSTOM_SUFFIX.len()..].eq_ignore_ascii_case(CUSTOM_SUFFIX)
    {
        (&token[..len - CUSTOM_SUFFIX.len()], true)
    } else {
        (token, false)
    }
}

/// Resolve a path token to a provider definition
pub async fn resolve_route(
    store: &dyn ProviderStore,
    resolver: &ProviderResolver,
    token: &str,
) -> AppResult<Route> {
    if let Some(alias) = store.get_alias(token).await? {
        match store.get_provider_by_id(alias.provider_id).await? {
            Some(definition) => {
                debug!(alias = %alias.alias, provider = %definition.name, kind = alias.kind.as_str(), "Routed by alias");
                return Ok(Route {
                    definition,
                    custom_prompt: alias.kind == AliasKind::Custom,
                    alias: Some(alias.alias),
                });
            }
            None => warn!(
                alias = %alias.alias,
                provider_id = alias.provider_id,
                "Alias points at a missing provider; trying literal name"
            ),
        }
    }

    let (name, custom_prompt) = split_custom_suffix(token);
    let definition = resolver.get_provider_by_name(name).await?;
    debug!(token = %token, provider = %definition.name, custom_prompt, "Routed by provider name");

    Ok(Route {
        definition,
        custom_prompt,
        alias: None,
    })
}
