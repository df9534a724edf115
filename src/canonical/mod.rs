//! Canonical dialect: the request/response shape the proxy presents to callers

pub mod types;
pub mod validate;

pub use types::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, ContentBlock, ImageSource,
    MessageContent, Role, StopReason, SystemPrompt, ToolChoice, ToolDeclaration,
    ToolResultContent, Usage,
};
pub use validate::{parse_body, validate_request};
