use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use balancer_core::{proxy::ProxyError, types::RpcOutcome};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{middleware::request_id, AppState};

/// Response header naming the endpoint that served a single call, or `batch`.
pub const X_UPSTREAM: &str = "x-upstream";

const LIVENESS_MESSAGE: &str =
    "This is a Privex steem-balancer node. Fake Jussi data returned for compatibility reasons.";

/// Handles `POST /` in single or batch form.
pub async fn handle_rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);

    let result = match decode_body(&body) {
        Ok(value) => state.engine.process_value(value).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            debug!(request_id = %request_id, upstream = %outcome.served_by, "request served");
            render_outcome(&outcome)
        }
        Err(e) => {
            info!(request_id = %request_id, error = %e, "request failed");
            render_error(&e)
        }
    }
}

/// Handles `GET /`: the liveness payload when there is no body, RPC otherwise.
pub async fn handle_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Json(liveness_payload()).into_response();
    }
    handle_rpc(State(state), headers, body).await
}

/// Handles `GET /metrics`.
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(metrics) => (
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Decodes a request body.
///
/// The body is parsed as JSON whatever the declared content type. Clients that
/// post the JSON as a urlencoded form key are accepted too.
///
/// # Errors
///
/// Returns [`ProxyError::InvalidRequest`] if neither form holds valid JSON.
pub fn decode_body(body: &[u8]) -> Result<Value, ProxyError> {
    let json_error = match serde_json::from_slice::<Value>(body) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    url::form_urlencoded::parse(body)
        .next()
        .and_then(|(key, _)| serde_json::from_str::<Value>(&key).ok())
        .ok_or_else(|| ProxyError::InvalidRequest(format!("body is not valid JSON: {json_error}")))
}

/// Static payload returned to monitoring that expects a jussi node.
#[must_use]
pub fn liveness_payload() -> Value {
    json!({
        "status": "OK",
        "datetime": chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        "source_commit": "000000",
        "jussi_num": 0,
        "message": LIVENESS_MESSAGE,
    })
}

fn render_outcome(outcome: &RpcOutcome) -> Response {
    let body = match outcome.body.to_value() {
        Ok(body) => body,
        Err(e) => return render_error(&ProxyError::Internal(format!("failed to encode reply: {e}"))),
    };

    let mut response = Json(body).into_response();
    if let Ok(marker) = HeaderValue::from_str(outcome.served_by.as_marker()) {
        response.headers_mut().insert(X_UPSTREAM, marker);
    }
    response
}

fn render_error(error: &ProxyError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(json!({"error": true, "message": error.to_string()}))).into_response()
}
