//! Canonical messages endpoints
//!
//! - `POST /v1/messages/:token` - alias or literal provider name
//! - `POST /v1/messages` - the active provider

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, OriginalUri, Path, State},
    http::HeaderMap,
    response::Response,
};
use bytes::Bytes;

use crate::orchestrator::{proxy_messages, InboundCall, Target};
use crate::AppState;

/// Route by alias or provider name
pub async fn messages_for_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    OriginalUri(uri): OriginalUri,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_messages(
        &state,
        InboundCall {
            target: Target::Token(token),
            path: uri.path(),
            headers: &headers,
            peer: connect_info.map(|ConnectInfo(addr)| addr),
            body,
        },
    )
    .await
}

/// Route to the active provider
pub async fn messages_default(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_messages(
        &state,
        InboundCall {
            target: Target::Active,
            path: "/v1/messages",
            headers: &headers,
            peer: connect_info.map(|ConnectInfo(addr)| addr),
            body,
        },
    )
    .await
}
