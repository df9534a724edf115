//! HTTP routes for Switchyard
//!
//! This module defines all HTTP endpoints exposed by the proxy.

pub mod health;
pub mod messages;
pub mod metrics;
pub mod providers;

use std::sync::Arc;

use axum::{
    http::Uri,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, middleware::api_key_middleware, AppState};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Rate limiting runs inside the orchestrator, after the settings lookup.
    let protected_routes = Router::new()
        .route("/v1/messages", post(messages::messages_default))
        .route("/v1/messages/:token", post(messages::messages_for_token))
        .route("/v1/providers", get(providers::list_providers))
        .route("/v1/providers/:name/test", post(providers::test_provider))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
