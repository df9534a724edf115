//! Mock infrastructure for upstream providers
//!
//! Each mock wraps a wiremock server that answers on the dialect path of
//! the provider it stands in for:
//! - `/chat/completions` for OpenAI-dialect providers
//! - `/messages` for canonical-dialect providers

pub mod logger;
pub mod upstream;

pub use logger::FailingLogger;
pub use upstream::*;
