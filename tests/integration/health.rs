//! Health endpoint integration tests
//!
//! - GET /health - Full health check with store status
//! - GET /health/ready - Readiness probe
//! - GET /health/live - Liveness probe

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::TestHarness;

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["checks"]["store"]["status"], "healthy");
    assert_eq!(body["registered_providers"], 6);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_probes() {
    let harness = TestHarness::new().await;

    let ready = harness.server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["status"], "healthy");

    let live = harness.server.get("/health/live").await;
    live.assert_status_ok();
    assert_eq!(live.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_health_over_sqlite_store() {
    let harness = TestHarness::sqlite().await;

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["checks"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_health_rejects_post() {
    let harness = TestHarness::new().await;

    let response = harness.server.post("/health").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/v2/nothing-here").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["status"], 404);
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let harness = TestHarness::with_api_key().await;

    let response = harness.server.get("/metrics").await;

    response.assert_status_ok();
}
