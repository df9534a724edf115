//! Integration tests for the Switchyard proxy
//!
//! These tests drive the full router against a mock upstream and verify the
//! request/response flow: routing, dialect translation, streaming relay,
//! rate limiting and error handling.

mod errors;
mod health;
mod messages;
mod rate_limiting;
mod streaming;
