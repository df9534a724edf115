//! In-memory store implementation
//!
//! Same contract as `SqliteStore`, kept in a `RwLock`. Used by tests and by
//! deployments that configure providers programmatically. It also counts
//! provider and alias lookups so tests can assert that a request never
//! reached resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{
    AliasKind, AppSettings, CommandAlias, PromptConfig, ProviderDefinition, ProviderStore,
    RequestLogger, RequestRecord, StoreError, StoreResult,
};

#[derive(Default)]
struct Inner {
    providers: Vec<ProviderDefinition>,
    aliases: Vec<CommandAlias>,
    settings: AppSettings,
    prompt: PromptConfig,
    logs: Vec<RequestRecord>,
    next_id: i64,
}

/// In-memory provider store and request log
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    lookups: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored settings
    pub fn with_settings(self, settings: AppSettings) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.settings = settings;
        }
        self
    }

    /// Number of provider or alias lookups served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Request records captured by `log_request`
    pub fn logged_requests(&self) -> Vec<RequestRecord> {
        self.read().map(|inner| inner.logs.clone()).unwrap_or_default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Pool("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Pool("store lock poisoned".to_string()))
    }

    fn count_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderStore for InMemoryStore {
    async fn get_provider(&self, name: &str) -> StoreResult<Option<ProviderDefinition>> {
        self.count_lookup();
        let inner = self.read()?;
        Ok(inner
            .providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn get_provider_by_id(&self, id: i64) -> StoreResult<Option<ProviderDefinition>> {
        self.count_lookup();
        let inner = self.read()?;
        Ok(inner.providers.iter().find(|p| p.id == id).cloned())
    }

    async fn list_providers(&self) -> StoreResult<Vec<ProviderDefinition>> {
        let inner = self.read()?;
        let mut providers = inner.providers.clone();
        providers.sort_by_key(|p| p.name.to_lowercase());
        Ok(providers)
    }

    async fn save_provider(&self, provider: &ProviderDefinition) -> StoreResult<i64> {
        let mut inner = self.write()?;

        if let Some(existing) = inner
            .providers
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&provider.name))
        {
            let id = existing.id;
            *existing = ProviderDefinition {
                id,
                ..provider.clone()
            };
            return Ok(id);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.providers.push(ProviderDefinition {
            id,
            ..provider.clone()
        });
        Ok(id)
    }

    async fn set_active_provider(&self, name: &str) -> StoreResult<bool> {
        let mut inner = self.write()?;
        if !inner.providers.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Ok(false);
        }
        for provider in inner.providers.iter_mut() {
            provider.is_active = provider.name.eq_ignore_ascii_case(name);
        }
        Ok(true)
    }

    async fn get_alias(&self, alias: &str) -> StoreResult<Option<CommandAlias>> {
        self.count_lookup();
        let inner = self.read()?;
        Ok(inner
            .aliases
            .iter()
            .find(|a| a.is_active && a.alias.eq_ignore_ascii_case(alias))
            .cloned())
    }

    async fn list_aliases(&self) -> StoreResult<Vec<CommandAlias>> {
        Ok(self.read()?.aliases.clone())
    }

    async fn set_alias(&self, provider_id: i64, kind: AliasKind, alias: &str) -> StoreResult<()> {
        let mut inner = self.write()?;

        if inner.aliases.iter().any(|a| {
            a.alias.eq_ignore_ascii_case(alias) && (a.provider_id != provider_id || a.kind != kind)
        }) {
            return Err(StoreError::InvalidValue(format!("alias '{alias}' is already bound")));
        }

        inner
            .aliases
            .retain(|a| !(a.provider_id == provider_id && a.kind == kind));
        inner.aliases.push(CommandAlias {
            provider_id,
            kind,
            alias: alias.to_string(),
            is_active: true,
        });
        Ok(())
    }

    async fn remove_alias(&self, provider_id: i64, kind: AliasKind) -> StoreResult<bool> {
        let mut inner = self.write()?;
        let before = inner.aliases.len();
        inner
            .aliases
            .retain(|a| !(a.provider_id == provider_id && a.kind == kind));
        Ok(inner.aliases.len() != before)
    }

    async fn get_app_settings(&self) -> StoreResult<AppSettings> {
        Ok(self.read()?.settings.clone())
    }

    async fn save_app_settings(&self, settings: &AppSettings) -> StoreResult<()> {
        self.write()?.settings = settings.clone();
        Ok(())
    }

    async fn get_prompt_config(&self) -> StoreResult<PromptConfig> {
        Ok(self.read()?.prompt.clone())
    }

    async fn save_prompt_config(&self, config: &PromptConfig) -> StoreResult<()> {
        self.write()?.prompt = config.clone();
        Ok(())
    }
}

#[async_trait]
impl RequestLogger for InMemoryStore {
    async fn log_request(&self, record: &RequestRecord) -> StoreResult<()> {
        self.write()?.logs.push(record.clone());
        Ok(())
    }
}
