//! Prometheus metrics endpoint
//!
//! Exposes proxy metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;
    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "switchyard_requests_total",
        "Total number of proxied requests by provider and status"
    );
    metrics::describe_histogram!(
        "switchyard_request_duration_seconds",
        "Proxied request duration in seconds"
    );
    metrics::describe_counter!(
        "switchyard_stream_chunks_total",
        "Response chunks relayed to streaming callers"
    );
    metrics::describe_counter!(
        "switchyard_rate_limited_total",
        "Requests rejected by the rate limiter"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a completed request
pub fn record_request(provider: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "switchyard_requests_total",
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("switchyard_request_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

pub fn record_stream_chunk(provider: &str) {
    metrics::counter!("switchyard_stream_chunks_total", "provider" => provider.to_string())
        .increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("switchyard_rate_limited_total").increment(1);
}
