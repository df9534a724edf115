//! Request orchestration
//!
//! Drives one inbound call through rate check, parsing, validation, provider
//! resolution, adapter preparation, dispatch and response handling. Every
//! step exits early with an [`AppError`]; upstream non-200 replies are
//! relayed verbatim instead.

pub mod context;
pub mod routing;

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::Instrument;

use crate::adapters::ProviderAdapter;
use crate::canonical::{parse_body, validate_request};
use crate::error::{AppError, AppResult};
use crate::middleware::{client_identifier, RateLimitConfig};
use crate::routes::metrics::{record_rate_limited, record_request};
use crate::store::{AppSettings, PromptConfig, RequestRecord};
use crate::streaming::relay;
use crate::AppState;

pub use context::RequestContext;
pub use routing::{resolve_route, split_custom_suffix, Route};

/// Which provider an inbound call targets
#[derive(Debug, Clone)]
pub enum Target {
    /// Alias or literal provider name from the path
    Token(String),
    /// The provider currently marked active
    Active,
}

/// One inbound messages call
pub struct InboundCall<'a> {
    pub target: Target,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub peer: Option<SocketAddr>,
    pub body: Bytes,
}

/// Handle an inbound messages call and produce the caller's response
pub async fn proxy_messages(state: &AppState, call: InboundCall<'_>) -> Response {
    let mut ctx = RequestContext::new(call.path);
    let span = ctx.create_span();

    async {
        match run(state, call, &mut ctx).await {
            Ok(response) => response,
            Err(e) => {
                ctx.log_error(e.code(), &e.to_string());
                if !ctx.provider.is_empty() {
                    record_request(
                        &ctx.provider,
                        e.status_code().as_u16(),
                        ctx.elapsed_ms() as f64 / 1000.0,
                    );
                }
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn run(state: &AppState, call: InboundCall<'_>, ctx: &mut RequestContext) -> AppResult<Response> {
    let settings = state.store.get_app_settings().await?;

    if settings.rate_limit_enabled {
        check_rate_limit(state, &settings, call.headers, call.peer)?;
    }

    let request = parse_body(call.headers, &call.body)?;
    validate_request(&request)?;

    let requested_model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let stream_requested = request
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let streaming = stream_requested && settings.enable_streaming;

    let route = match &call.target {
        Target::Token(token) => resolve_route(state.store.as_ref(), &state.resolver, token).await?,
        Target::Active => Route {
            definition: state.resolver.get_active_provider().await?,
            custom_prompt: false,
            alias: None,
        },
    };

    *ctx = ctx
        .clone()
        .with_provider(route.definition.name.clone())
        .with_model(requested_model)
        .with_streaming(streaming)
        .with_custom_prompt(route.custom_prompt);
    ctx.log_request_start();

    if stream_requested && !streaming {
        ctx.log_warning("Streaming disabled in settings; serving buffered response");
    }

    let adapter = state.resolver.create_provider_instance(&route.definition)?;
    let provider = adapter.name().to_string();

    let prompt = if route.custom_prompt {
        custom_prompt(state).await?
    } else {
        None
    };

    let mut upstream_request = adapter
        .prepare_request(&request, prompt.as_ref())
        .map_err(|e| AppError::RequestPrep {
            provider: provider.clone(),
            message: e.to_string(),
        })?;
    if stream_requested && !streaming {
        if let Some(object) = upstream_request.as_object_mut() {
            object.insert("stream".to_string(), Value::Bool(false));
        }
    }

    let upstream_model = upstream_request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ctx.log_upstream_model(&upstream_model);

    let response = adapter
        .send_request(&upstream_request, streaming)
        .await
        .map_err(|e| AppError::Provider {
            provider: provider.clone(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        ctx.log_upstream_status(status.as_u16());
        record_request(&provider, status.as_u16(), ctx.elapsed_ms() as f64 / 1000.0);
        return relay_upstream_error(&provider, response).await;
    }

    if streaming {
        return Ok(stream_response(adapter.as_ref(), response, ctx.clone()));
    }

    let body = response.bytes().await.map_err(|e| AppError::ResponseParse {
        provider: provider.clone(),
        message: e.to_string(),
    })?;
    let parsed: Value = serde_json::from_slice(&body).map_err(|e| AppError::ResponseParse {
        provider: provider.clone(),
        message: e.to_string(),
    })?;
    let canonical = adapter
        .process_response(parsed)
        .map_err(|e| AppError::ResponseProcess {
            provider: provider.clone(),
            message: e.to_string(),
        })?;

    if settings.enable_full_logging {
        let record = RequestRecord {
            request_id: ctx.request_id.clone(),
            provider_name: provider.clone(),
            model_used: ctx.model.clone().unwrap_or_default(),
            request_data: request.to_string(),
            response_data: canonical.to_string(),
            status_code: StatusCode::OK.as_u16(),
            duration_ms: ctx.elapsed_ms(),
        };
        if let Err(e) = state.logger.log_request(&record).await {
            ctx.log_warning(&format!("Failed to log request: {e}"));
        }
    }

    ctx.log_request_complete(StatusCode::OK.as_u16());
    record_request(&provider, StatusCode::OK.as_u16(), ctx.elapsed_ms() as f64 / 1000.0);

    Ok(Json(canonical).into_response())
}

fn check_rate_limit(
    state: &AppState,
    settings: &AppSettings,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> AppResult<()> {
    let config = RateLimitConfig::from_settings(settings);
    let identifier = client_identifier(headers, peer, state.config.trust_forwarded_for);
    let result = state.rate_limiter.check(&identifier, &config);
    if !result.allowed {
        tracing::warn!(client = %identifier, limit = result.limit, "Rate limit exceeded");
        record_rate_limited();
    }
    result.into_result(&config).map(|_| ())
}

/// Prompt config for custom-prompt calls, when a template is enabled
async fn custom_prompt(state: &AppState) -> AppResult<Option<PromptConfig>> {
    let config = state.store.get_prompt_config().await?;
    let usable = config.use_custom_prompt
        && config
            .prompt_template
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
    Ok(usable.then_some(config))
}

/// Relay an upstream error reply: same status, content type and body
async fn relay_upstream_error(provider: &str, response: reqwest::Response) -> AppResult<Response> {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let body = response.bytes().await.map_err(|e| AppError::Provider {
        provider: provider.to_string(),
        message: e.to_string(),
    })?;

    let mut relayed = (status, body).into_response();
    match content_type {
        Some(value) => {
            relayed.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        None => {
            relayed.headers_mut().remove(header::CONTENT_TYPE);
        }
    }
    Ok(relayed)
}

fn stream_response(
    adapter: &dyn ProviderAdapter,
    response: reqwest::Response,
    ctx: RequestContext,
) -> Response {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("text/event-stream"));

    record_request(&ctx.provider, StatusCode::OK.as_u16(), ctx.elapsed_ms() as f64 / 1000.0);
    let upstream = adapter.process_stream_response(response);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(relay(upstream, ctx)),
    )
        .into_response()
}
