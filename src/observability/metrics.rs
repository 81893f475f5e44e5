//! Prometheus metrics (ambient stack; `metrics` + `metrics-exporter-prometheus`
//! in the style other services in this corpus use them).

use std::sync::OnceLock;

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");
    let _ = PROMETHEUS_HANDLE.set(handle);
}

/// `GET /metrics`.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized".to_string()),
    }
}

pub fn record_request(stream: bool) {
    counter!("gateway_requests_total", "stream" => stream.to_string()).increment(1);
}

pub fn record_request_duration(stream: bool, duration_seconds: f64) {
    histogram!("gateway_request_duration_seconds", "stream" => stream.to_string()).record(duration_seconds);
}

pub fn record_response_status(status: &'static str) {
    counter!("gateway_responses_total", "status" => status).increment(1);
}

pub fn record_tool_call(tool: &str, server_side: bool) {
    counter!(
        "gateway_tool_calls_total",
        "tool" => tool.to_string(),
        "server_side" => server_side.to_string()
    )
    .increment(1);
}

pub fn record_backend_error(kind: &'static str) {
    counter!("gateway_backend_errors_total", "kind" => kind).increment(1);
}

pub fn record_tokens(input_tokens: u64, output_tokens: u64, reasoning_tokens: u64) {
    counter!("gateway_tokens_total", "kind" => "input").increment(input_tokens);
    counter!("gateway_tokens_total", "kind" => "output").increment(output_tokens);
    counter!("gateway_tokens_total", "kind" => "reasoning").increment(reasoning_tokens);
}

/// Times a request and records its duration on drop, so early returns still
/// get measured.
pub struct RequestTimer {
    start: std::time::Instant,
    stream: bool,
}

impl RequestTimer {
    pub fn new(stream: bool) -> Self {
        record_request(stream);
        Self {
            start: std::time::Instant::now(),
            stream,
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(self.stream, self.start.elapsed().as_secs_f64());
    }
}
