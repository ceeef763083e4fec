//! HTTP boundary for the balancer: route table, body decoding, response
//! rendering and the request-id middleware.

pub mod middleware;
pub mod router;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use balancer_core::{config::ServerConfig, metrics::MetricsCollector, proxy::ProxyEngine};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    /// `None` when metrics are disabled; `/metrics` then answers 404.
    pub metrics: Option<MetricsCollector>,
}

/// Builds the application router.
///
/// `GET /` answers the liveness payload, `POST /` (and `GET /` with a body)
/// processes RPC calls, `GET /metrics` renders Prometheus text.
pub fn create_app(state: AppState, server: &ServerConfig) -> Router {
    let (set_request_id, propagate_request_id) = middleware::create_request_id_layers();

    Router::new()
        .route("/", get(router::handle_get).post(router::handle_rpc))
        .route("/metrics", get(router::handle_metrics))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        // Layers are applied in reverse order, so propagate runs after set
        .layer(propagate_request_id)
        .layer(set_request_id)
}
