//! SQLite-backed store with versioned migrations

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::pool::SqlitePool;
use super::{
    AliasKind, AppSettings, AuthMethod, CommandAlias, Dialect, PromptConfig, ProviderDefinition,
    ProviderStore, RequestLogger, RequestRecord, StoreError, StoreResult,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

const PROVIDER_COLUMNS: &str = "id, name, api_endpoint, api_key, default_model, auth_method, \
     is_active, api_standard, model_mapping";

/// Provider store over a pooled SQLite database
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database and bring its schema up to date
    pub async fn open(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        let store = Self::with_pool(SqlitePool::open(path, pool_size)?);
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `f` against a pooled connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let mut pooled = self.pool.checkout().await?;
        let mut conn = pooled
            .detach()
            .ok_or_else(|| StoreError::Pool("checked-out connection missing".to_string()))?;

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await
        .map_err(|e| StoreError::Pool(format!("blocking task failed: {e}")))?;

        pooled.attach(conn);
        result
    }

    /// Apply every migration newer than the recorded schema version
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )?;

            let current: i32 = conn.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )?;

            info!(current, target = SCHEMA_VERSION, "Database schema version");

            if current < 1 {
                migrate_v1(conn)?;
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [1])?;
            }
            if current < 2 {
                migrate_v2(conn)?;
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;
            }

            Ok(())
        })
        .await
    }

    /// Number of persisted request log rows
    pub async fn request_log_count(&self) -> StoreResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM request_logs", [], |row| row.get(0))?)
        })
        .await
    }
}

/// Core tables: providers, headers, settings, prompt config, request logs
fn migrate_v1(conn: &Connection) -> StoreResult<()> {
    info!("Applying migration v1: core tables");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            api_endpoint TEXT NOT NULL,
            api_key TEXT NOT NULL DEFAULT '',
            default_model TEXT,
            auth_method TEXT NOT NULL DEFAULT 'bearer_token',
            is_active INTEGER NOT NULL DEFAULT 0,
            api_standard TEXT NOT NULL DEFAULT 'openai',
            model_mapping TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS provider_headers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id) ON DELETE CASCADE,
            header_key TEXT NOT NULL,
            header_value TEXT NOT NULL,
            UNIQUE(provider_id, header_key)
        );

        CREATE TABLE IF NOT EXISTS app_settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            server_host TEXT NOT NULL DEFAULT '127.0.0.1',
            server_port INTEGER NOT NULL DEFAULT 8000,
            enable_full_logging INTEGER NOT NULL DEFAULT 1,
            enable_streaming INTEGER NOT NULL DEFAULT 1,
            request_timeout INTEGER NOT NULL DEFAULT 300,
            rate_limit_enabled INTEGER NOT NULL DEFAULT 1,
            rate_limit_requests INTEGER NOT NULL DEFAULT 100,
            rate_limit_window INTEGER NOT NULL DEFAULT 3600,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        INSERT OR IGNORE INTO app_settings (id) VALUES (1);

        CREATE TABLE IF NOT EXISTS prompt_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            use_custom_prompt INTEGER NOT NULL DEFAULT 0,
            prompt_template TEXT,
            system_name TEXT NOT NULL DEFAULT 'AI Assistant',
            model_name_override TEXT,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        INSERT OR IGNORE INTO prompt_config (id) VALUES (1);

        CREATE TABLE IF NOT EXISTS request_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id TEXT NOT NULL,
            provider_name TEXT,
            model_used TEXT,
            request_data TEXT,
            response_data TEXT,
            status_code INTEGER,
            duration_ms INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_request_logs_created ON request_logs(created_at);",
    )?;
    Ok(())
}

/// Command aliases
fn migrate_v2(conn: &Connection) -> StoreResult<()> {
    info!("Applying migration v2: command aliases");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS command_aliases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id) ON DELETE RESTRICT,
            alias_type TEXT NOT NULL CHECK (alias_type IN ('standard', 'custom')),
            command_alias TEXT NOT NULL UNIQUE COLLATE NOCASE,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(provider_id, alias_type)
        );
        CREATE INDEX IF NOT EXISTS idx_command_aliases_provider ON command_aliases(provider_id);",
    )?;
    Ok(())
}

/// Raw provider row before headers are attached
struct ProviderRow {
    definition: ProviderDefinition,
    model_mapping: String,
    auth_method: String,
    api_standard: String,
}

fn read_provider_row(row: &Row<'_>) -> rusqlite::Result<ProviderRow> {
    Ok(ProviderRow {
        definition: ProviderDefinition {
            id: row.get(0)?,
            name: row.get(1)?,
            api_endpoint: row.get(2)?,
            api_key: row.get(3)?,
            default_model: row.get(4)?,
            auth_method: AuthMethod::default(),
            headers: BTreeMap::new(),
            api_standard: Dialect::default(),
            model_mapping: BTreeMap::new(),
            is_active: row.get(6)?,
        },
        auth_method: row.get(5)?,
        api_standard: row.get(7)?,
        model_mapping: row.get(8)?,
    })
}

fn finish_provider(conn: &Connection, raw: ProviderRow) -> StoreResult<ProviderDefinition> {
    let mut definition = raw.definition;
    definition.auth_method = AuthMethod::parse(&raw.auth_method)?;
    definition.api_standard = Dialect::parse(&raw.api_standard)?;
    definition.model_mapping = if raw.model_mapping.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_json::from_str(&raw.model_mapping)?
    };

    let mut stmt = conn.prepare(
        "SELECT header_key, header_value FROM provider_headers WHERE provider_id = ?1 ORDER BY header_key",
    )?;
    let headers = stmt
        .query_map([definition.id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    definition.headers = headers;

    Ok(definition)
}

fn query_provider(
    conn: &Connection,
    clause: &str,
    param: &dyn rusqlite::ToSql,
) -> StoreResult<Option<ProviderDefinition>> {
    let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE {clause}");
    let raw = conn
        .query_row(&sql, [param], read_provider_row)
        .optional()?;
    raw.map(|raw| finish_provider(conn, raw)).transpose()
}

fn read_alias(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_alias((provider_id, kind, alias, is_active): (i64, String, String, bool)) -> StoreResult<CommandAlias> {
    Ok(CommandAlias {
        provider_id,
        kind: AliasKind::parse(&kind)?,
        alias,
        is_active,
    })
}

#[async_trait]
impl ProviderStore for SqliteStore {
    async fn get_provider(&self, name: &str) -> StoreResult<Option<ProviderDefinition>> {
        let name = name.to_string();
        self.with_conn(move |conn| query_provider(conn, "name = ?1 COLLATE NOCASE", &name))
            .await
    }

    async fn get_provider_by_id(&self, id: i64) -> StoreResult<Option<ProviderDefinition>> {
        self.with_conn(move |conn| query_provider(conn, "id = ?1", &id))
            .await
    }

    async fn list_providers(&self) -> StoreResult<Vec<ProviderDefinition>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers ORDER BY name");
            let rows = conn
                .prepare(&sql)?
                .query_map([], read_provider_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|raw| finish_provider(conn, raw)).collect()
        })
        .await
    }

    async fn save_provider(&self, provider: &ProviderDefinition) -> StoreResult<i64> {
        let provider = provider.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mapping = serde_json::to_string(&provider.model_mapping)?;

            tx.execute(
                "INSERT INTO providers
                    (name, api_endpoint, api_key, default_model, auth_method, is_active, api_standard, model_mapping)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(name) DO UPDATE SET
                    api_endpoint = excluded.api_endpoint,
                    api_key = excluded.api_key,
                    default_model = excluded.default_model,
                    auth_method = excluded.auth_method,
                    is_active = excluded.is_active,
                    api_standard = excluded.api_standard,
                    model_mapping = excluded.model_mapping,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    provider.name,
                    provider.api_endpoint,
                    provider.api_key,
                    provider.default_model,
                    provider.auth_method.as_str(),
                    provider.is_active,
                    provider.api_standard.as_str(),
                    mapping,
                ],
            )?;

            let id: i64 = tx.query_row(
                "SELECT id FROM providers WHERE name = ?1 COLLATE NOCASE",
                [&provider.name],
                |row| row.get(0),
            )?;

            tx.execute("DELETE FROM provider_headers WHERE provider_id = ?1", [id])?;
            for (key, value) in &provider.headers {
                tx.execute(
                    "INSERT INTO provider_headers (provider_id, header_key, header_value) VALUES (?1, ?2, ?3)",
                    params![id, key, value],
                )?;
            }

            tx.commit()?;
            debug!(provider = %provider.name, id, "Provider saved");
            Ok(id)
        })
        .await
    }

    async fn set_active_provider(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let exists = tx
                .query_row(
                    "SELECT id FROM providers WHERE name = ?1 COLLATE NOCASE",
                    [&name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;

            let Some(id) = exists else {
                return Ok(false);
            };

            tx.execute("UPDATE providers SET is_active = (id = ?1)", [id])?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn get_alias(&self, alias: &str) -> StoreResult<Option<CommandAlias>> {
        let alias = alias.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT provider_id, alias_type, command_alias, is_active FROM command_aliases
                     WHERE command_alias = ?1 COLLATE NOCASE AND is_active = 1",
                    [&alias],
                    read_alias,
                )
                .optional()?;
            row.map(to_alias).transpose()
        })
        .await
    }

    async fn list_aliases(&self) -> StoreResult<Vec<CommandAlias>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT provider_id, alias_type, command_alias, is_active FROM command_aliases
                     ORDER BY provider_id, alias_type",
                )?
                .query_map([], read_alias)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(to_alias).collect()
        })
        .await
    }

    async fn set_alias(&self, provider_id: i64, kind: AliasKind, alias: &str) -> StoreResult<()> {
        let alias = alias.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO command_aliases (provider_id, alias_type, command_alias)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(provider_id, alias_type) DO UPDATE SET
                    command_alias = excluded.command_alias,
                    is_active = 1,
                    updated_at = CURRENT_TIMESTAMP",
                params![provider_id, kind.as_str(), alias],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_alias(&self, provider_id: i64, kind: AliasKind) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM command_aliases WHERE provider_id = ?1 AND alias_type = ?2",
                params![provider_id, kind.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn get_app_settings(&self) -> StoreResult<AppSettings> {
        self.with_conn(|conn| {
            let settings = conn
                .query_row(
                    "SELECT server_host, server_port, enable_full_logging, enable_streaming,
                            request_timeout, rate_limit_enabled, rate_limit_requests, rate_limit_window
                     FROM app_settings WHERE id = 1",
                    [],
                    |row| {
                        Ok(AppSettings {
                            server_host: row.get(0)?,
                            server_port: row.get(1)?,
                            enable_full_logging: row.get(2)?,
                            enable_streaming: row.get(3)?,
                            request_timeout: row.get(4)?,
                            rate_limit_enabled: row.get(5)?,
                            rate_limit_requests: row.get(6)?,
                            rate_limit_window: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(settings.unwrap_or_default())
        })
        .await
    }

    async fn save_app_settings(&self, settings: &AppSettings) -> StoreResult<()> {
        let settings = settings.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO app_settings
                    (id, server_host, server_port, enable_full_logging, enable_streaming,
                     request_timeout, rate_limit_enabled, rate_limit_requests, rate_limit_window)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    server_host = excluded.server_host,
                    server_port = excluded.server_port,
                    enable_full_logging = excluded.enable_full_logging,
                    enable_streaming = excluded.enable_streaming,
                    request_timeout = excluded.request_timeout,
                    rate_limit_enabled = excluded.rate_limit_enabled,
                    rate_limit_requests = excluded.rate_limit_requests,
                    rate_limit_window = excluded.rate_limit_window,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    settings.server_host,
                    settings.server_port,
                    settings.enable_full_logging,
                    settings.enable_streaming,
                    settings.request_timeout,
                    settings.rate_limit_enabled,
                    settings.rate_limit_requests,
                    settings.rate_limit_window,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_prompt_config(&self) -> StoreResult<PromptConfig> {
        self.with_conn(|conn| {
            let config = conn
                .query_row(
                    "SELECT use_custom_prompt, prompt_template, system_name, model_name_override
                     FROM prompt_config WHERE id = 1",
                    [],
                    |row| {
                        Ok(PromptConfig {
                            use_custom_prompt: row.get(0)?,
                            prompt_template: row.get(1)?,
                            system_name: row.get(2)?,
                            model_name_override: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(config.unwrap_or_default())
        })
        .await
    }

    async fn save_prompt_config(&self, config: &PromptConfig) -> StoreResult<()> {
        let config = config.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO prompt_config (id, use_custom_prompt, prompt_template, system_name, model_name_override)
                 VALUES (1, ?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    use_custom_prompt = excluded.use_custom_prompt,
                    prompt_template = excluded.prompt_template,
                    system_name = excluded.system_name,
                    model_name_override = excluded.model_name_override,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    config.use_custom_prompt,
                    config.prompt_template,
                    config.system_name,
                    config.model_name_override,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RequestLogger for SqliteStore {
    async fn log_request(&self, record: &RequestRecord) -> StoreResult<()> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO request_logs
                    (request_id, provider_name, model_used, request_data, response_data, status_code, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.request_id,
                    record.provider_name,
                    record.model_used,
                    record.request_data,
                    record.response_data,
                    record.status_code,
                    record.duration_ms,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
