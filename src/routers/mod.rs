//! HTTP surface: one real route (`/v1/responses`) plus a health check and a
//! Prometheus scrape endpoint, assembled the way the corpus wires up an axum
//! `Router` — CORS and request tracing as `tower` layers, shared state as an
//! `Engine` clone.

pub mod error;
pub mod responses;

use axum::{routing::get, routing::post, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::Engine;
use crate::observability::metrics::metrics_handler;

pub fn build(engine: Engine) -> Router {
    Router::new()
        .route("/v1/responses", post(responses::handle))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

async fn health() -> &'static str {
    "ok"
}
