//! Middleware module
//!
//! Inbound API key checks and the client rate limiter.

pub mod auth;
pub mod rate_limiter;

pub use auth::{api_key_middleware, ApiKeys};
pub use rate_limiter::{client_identifier, RateLimitConfig, RateLimitResult, RateLimiter};
