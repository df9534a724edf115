//! Provider listing and connection tests

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::error::AppResult;
use crate::registry::EndpointInfo;
use crate::resolver::AvailableProvider;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Default routes for every registered adapter
    pub endpoints: Vec<EndpointInfo>,
    /// Stored provider definitions
    pub providers: Vec<AvailableProvider>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestResponse {
    pub provider: String,
    pub success: bool,
}

/// `GET /v1/providers`
pub async fn list_providers(State(state): State<Arc<AppState>>) -> AppResult<Json<ProvidersResponse>> {
    Ok(Json(ProvidersResponse {
        endpoints: state.registry.get_all_endpoints(),
        providers: state.resolver.get_available_providers().await?,
    }))
}

/// `POST /v1/providers/:name/test`
pub async fn test_provider(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Json<ConnectionTestResponse>> {
    let definition = state.resolver.get_provider_by_name(&name).await?;
    let adapter = state.resolver.create_provider_instance(&definition)?;
    let success = adapter.test_connection().await;

    info!(provider = %definition.name, success, "Connection test finished");

    Ok(Json(ConnectionTestResponse {
        provider: definition.name,
        success,
    }))
}
