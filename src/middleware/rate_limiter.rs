//! Rate limiting
//!
//! Sliding-log limiter keyed by client address, kept in process memory.
//! The orchestrator checks it before reading the request body.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::store::AppSettings;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            settings.rate_limit_requests,
            Duration::from_secs(settings.rate_limit_window),
        )
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window
    pub retry_after: Duration,
}

impl RateLimitResult {
    /// Turn a rejection into the 429 error
    pub fn into_result(self, config: &RateLimitConfig) -> AppResult<Self> {
        if self.allowed {
            return Ok(self);
        }
        Err(AppError::RateLimited {
            limit: self.limit,
            window_seconds: config.window.as_secs(),
            retry_after_secs: self.retry_after.as_secs().max(1),
        })
    }
}

/// In-memory sliding-log rate limiter
#[derive(Default)]
pub struct RateLimiter {
    log: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for `identifier` and report whether it is allowed
    ///
    /// Rejected requests are not recorded.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = Instant::now();
        let mut log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let entries = log.entry(identifier.to_string()).or_default();
        while let Some(oldest) = entries.front() {
            if now.duration_since(*oldest) >= config.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        let used = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        if used >= config.max_requests {
            let retry_after = entries
                .front()
                .map(|oldest| config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(config.window);
            return RateLimitResult {
                allowed: false,
                limit: config.max_requests,
                remaining: 0,
                retry_after,
            };
        }

        entries.push_back(now);
        RateLimitResult {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests - used - 1,
            retry_after: Duration::ZERO,
        }
    }

    /// Drop identifiers with no requests inside the window
    pub fn prune(&self, config: &RateLimitConfig) {
        let now = Instant::now();
        if let Ok(mut log) = self.log.lock() {
            log.retain(|_, entries| {
                entries
                    .back()
                    .map(|last| now.duration_since(*last) < config.window)
                    .unwrap_or(false)
            });
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }
}

/// Client identifier: the peer address
///
/// The first `x-forwarded-for` entry is used instead only when
/// `trust_forwarded_for` is set, since callers control that header.
pub fn client_identifier(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .flatten();

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
