//! Inbound API key authentication
//!
//! Active only when `PROXY_API_KEYS` is configured. Keys are held and
//! compared as SHA-256 digests.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, AppState};

/// Extract the token from a `Bearer` authorization value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Hex SHA-256 digest of a key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Set of accepted key digests
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    digests: HashSet<String>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .map(|k| hash_key(&k))
                .collect(),
        }
    }

    /// Parse a comma-separated key list
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_enabled(&self) -> bool {
        !self.digests.is_empty()
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.digests.contains(&hash_key(key))
    }
}

/// Presented key from `x-api-key` or `Authorization: Bearer`
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(extract_bearer_token)
        })
}

/// Reject requests without an accepted key when keys are configured
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let keys = &state.config.api_keys;
    if !keys.is_enabled() {
        return Ok(next.run(request).await);
    }

    let key = presented_key(request.headers())
        .ok_or_else(|| AppError::Authentication("Missing API key".to_string()))?;

    if !keys.accepts(key) {
        let digest = hash_key(key);
        warn!(key_prefix = %&digest[..12], "Rejected unknown API key");
        return Err(AppError::Authentication("Invalid API key".to_string()));
    }

    debug!("API key accepted");
    Ok(next.run(request).await)
}
