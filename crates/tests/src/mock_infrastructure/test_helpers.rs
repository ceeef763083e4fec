//! Wiring helpers shared by the integration tests.

use axum::{body::Body, http::Request, Router};
use balancer_core::{
    config::{BatchConfig, ServerConfig},
    metrics::MetricsCollector,
    proxy::{EngineConfig, ProxyEngine},
    upstream::{Endpoint, EndpointRegistry, HttpClient, RetryPolicy, WeightedSelector},
};
use serde_json::Value;
use server::{create_app, AppState};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

/// Engine settings with millisecond backoff so retries do not slow the suite.
#[must_use]
pub fn fast_engine_config(batch: BatchConfig) -> EngineConfig {
    EngineConfig {
        batch,
        retry: RetryPolicy::new().with_base_delay_ms(1).with_max_delay_ms(5),
        request_timeout: Duration::from_secs(5),
    }
}

/// Builds an engine over `endpoints`.
///
/// # Panics
///
/// Panics if two endpoints share an identity or a weight is out of range.
#[must_use]
pub fn engine_with(endpoints: Vec<Endpoint>, config: EngineConfig) -> ProxyEngine {
    let registry = EndpointRegistry::from_endpoints(endpoints).expect("unique endpoint identities");
    let selector = Arc::new(WeightedSelector::new(Arc::new(registry)));
    let http_client = Arc::new(HttpClient::new().expect("http client"));
    ProxyEngine::new(selector, http_client, MetricsCollector::new(), config)
}

/// Builds an engine over `endpoints` with the default batch limits.
#[must_use]
pub fn engine_for(endpoints: Vec<Endpoint>) -> ProxyEngine {
    engine_with(endpoints, fast_engine_config(BatchConfig::default()))
}

/// Builds the full router over `engine`.
#[must_use]
pub fn app_for(engine: ProxyEngine) -> Router {
    let state = AppState { engine: Arc::new(engine), metrics: Some(MetricsCollector::new()) };
    create_app(state, &ServerConfig::default())
}

/// A decoded HTTP reply.
pub struct HttpReply {
    pub status: u16,
    pub upstream: Option<String>,
    pub body: Value,
}

/// Posts `body` to `/` and decodes the reply.
///
/// # Panics
///
/// Panics if the router fails to produce a response.
pub async fn post_rpc(app: Router, body: impl Into<String>) -> HttpReply {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status().as_u16();
    let upstream = response
        .headers()
        .get(server::router::X_UPSTREAM)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    HttpReply { status, upstream, body: serde_json::from_slice(&bytes).unwrap_or(Value::Null) }
}
