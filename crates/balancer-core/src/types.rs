//! Core type definitions for JSON-RPC calls and dispatch results.
//!
//! # Type Categories
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: Protocol conformance
//!
//! ## Dispatch Results
//! - [`RpcOutcome`], [`RpcBody`], [`ServedBy`]: What the engine hands back to the
//!   HTTP boundary, including the out-of-band endpoint identity marker.

use serde::{Deserialize, Deserializer, Serialize};
use std::{borrow::Cow, sync::Arc};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for JSON-RPC version - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Header value used for the endpoint marker when a batch was served.
pub const BATCH_MARKER: &str = "batch";

fn default_version() -> Cow<'static, str> {
    JSONRPC_VERSION_COW
}

// Clients that omit the id get `1` echoed back.
fn default_id() -> Arc<serde_json::Value> {
    Arc::new(serde_json::Value::from(1))
}

/// JSON-RPC 2.0 request structure.
///
/// Inbound calls may omit `jsonrpc` and `id`; both are defaulted during
/// deserialization so every call carries an id that can be echoed.
///
/// # Example
///
/// ```
/// use balancer_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("condenser_api.get_block", Some(json!([1])), json!(5));
///
/// assert_eq!(request.method, "condenser_api.get_block");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default = "default_id")]
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with zero allocation for the version string.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }

    /// Returns a copy of this call carrying a different id.
    ///
    /// Used when forwarding batch members upstream under positional ids.
    #[must_use]
    pub fn with_id(&self, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION_COW,
            method: self.method.clone(),
            params: self.params.clone(),
            id: Arc::new(id),
        }
    }
}

/// JSON-RPC 2.0 response structure.
///
/// `result` is always serialized (as `null` when absent) so that success
/// envelopes keep the `{"jsonrpc", "result", "id"}` shape; `error` is only
/// emitted when present.
///
/// On decode, an explicit `"result": null` becomes `Some(Value::Null)` while a
/// missing key stays `None`, so callers can tell a null result from a body
/// that is not a reply at all.
///
/// # Example
///
/// ```
/// use balancer_core::types::JsonRpcResponse;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let response = JsonRpcResponse::success(json!({"block_id": "00000001"}), Arc::new(json!(5)));
/// assert!(response.result.is_some());
/// assert!(response.error.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_version")]
    pub jsonrpc: Cow<'static, str>,
    #[serde(default, deserialize_with = "present_value")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default = "null_id")]
    pub id: Arc<serde_json::Value>,
}

fn null_id() -> Arc<serde_json::Value> {
    Arc::new(serde_json::Value::Null)
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    /// Creates a successful JSON-RPC response.
    #[must_use]
    pub fn success(result: serde_json::Value, id: Arc<serde_json::Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, result: Some(result), error: None, id }
    }
}

/// JSON-RPC 2.0 error object.
///
/// Steem nodes attach an assertion trace in `data`; it is carried through
/// untouched but never inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Which endpoint produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedBy {
    /// A single call, served by the endpoint with this identity.
    Endpoint(Arc<str>),
    /// A batch; results may come from several endpoints.
    Batch,
}

impl ServedBy {
    /// Value for the `X-Upstream` marker.
    #[must_use]
    pub fn as_marker(&self) -> &str {
        match self {
            Self::Endpoint(identity) => identity,
            Self::Batch => BATCH_MARKER,
        }
    }
}

impl std::fmt::Display for ServedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_marker())
    }
}

/// Response payload of a processed request.
#[derive(Debug, Clone)]
pub enum RpcBody {
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
}

impl RpcBody {
    /// Serializes the payload into a JSON value for the HTTP layer.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if an envelope cannot be serialized.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Single(response) => serde_json::to_value(response),
            Self::Batch(responses) => serde_json::to_value(responses),
        }
    }
}

/// A fully dispatched request together with its endpoint marker.
#[derive(Debug, Clone)]
pub struct RpcOutcome {
    pub body: RpcBody,
    pub served_by: ServedBy,
}
