//! Error types for Switchyard
//!
//! Every proxy-side failure is rendered with the same body shape:
//! `{"error": {"message": ..., "code": ..., "status": ...}}`. Upstream HTTP
//! errors never pass through here; they are relayed verbatim by the
//! orchestrator.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Request body is empty")]
    EmptyRequest,

    #[error("{0}")]
    Validation(String),

    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// Adapter instantiation or upstream transport failure
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Error preparing request for '{provider}': {message}")]
    RequestPrep { provider: String, message: String },

    #[error("Error parsing response from '{provider}': {message}")]
    ResponseParse { provider: String, message: String },

    #[error("Error processing response from '{provider}': {message}")]
    ResponseProcess { provider: String, message: String },

    #[error("Rate limit exceeded: {limit} requests per {window_seconds} seconds")]
    RateLimited {
        limit: u32,
        window_seconds: u64,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: &str, status: StatusCode) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code: code.to_string(),
                status: status.as_u16(),
            },
        }
    }
}

impl AppError {
    /// Machine-readable error code from the fixed taxonomy
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::EmptyRequest => "EMPTY_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            AppError::Provider { .. } => "PROVIDER_ERROR",
            AppError::RequestPrep { .. } => "REQUEST_PREP_ERROR",
            AppError::ResponseParse { .. } => "RESPONSE_PARSE_ERROR",
            AppError::ResponseProcess { .. } => "RESPONSE_PROCESS_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMIT_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Store(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::EmptyRequest | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ProviderNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Provider { .. }
            | AppError::RequestPrep { .. }
            | AppError::ResponseParse { .. }
            | AppError::ResponseProcess { .. }
            | AppError::Store(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(self.to_string(), self.code(), status);

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited {
            limit,
            retry_after_secs,
            ..
        } = &self
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            headers.insert(
                header::HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(*limit),
            );
            headers.insert(
                header::HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_static("0"),
            );
        }

        response
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
