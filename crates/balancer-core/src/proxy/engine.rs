use std::{sync::Arc, time::Duration};

use ahash::AHashMap;
use futures::future::join_all;

use crate::{
    config::{AppConfig, BatchConfig},
    metrics::{MetricsCollector, RequestKind},
    types::{JsonRpcRequest, JsonRpcResponse, RpcBody, RpcOutcome, ServedBy},
    upstream::{
        endpoint::Endpoint, errors::UpstreamError, http_client::HttpClient, retry::RetryPolicy,
        selector::WeightedSelector,
    },
};

use super::{
    batch::{self, Chunk},
    errors::ProxyError,
};

/// Dispatch settings shared by every request.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch: config.batch.clone(),
            retry: config.retry.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Routes single calls and batches to eligible endpoints.
///
/// A single call goes to one endpoint chosen for its method. A batch is
/// planned into same-method chunks, every chunk is sent concurrently to an
/// endpoint chosen for its method, and the replies are put back into the
/// client's order. If any chunk fails the whole batch fails.
pub struct ProxyEngine {
    selector: Arc<WeightedSelector>,
    http_client: Arc<HttpClient>,
    metrics: MetricsCollector,
    config: EngineConfig,
}

impl ProxyEngine {
    #[must_use]
    pub fn new(
        selector: Arc<WeightedSelector>,
        http_client: Arc<HttpClient>,
        metrics: MetricsCollector,
        config: EngineConfig,
    ) -> Self {
        Self { selector, http_client, metrics, config }
    }

    #[must_use]
    pub fn selector(&self) -> &Arc<WeightedSelector> {
        &self.selector
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes a decoded request body: an object is a single call, an array a batch.
    ///
    /// The batch size gate runs before any member is parsed.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidRequest`] for a body that is neither object
    /// nor array, [`ProxyError::Validation`] for a malformed call,
    /// [`ProxyError::BatchTooLarge`] for an oversized batch, and
    /// [`ProxyError::Upstream`] if dispatch fails.
    pub async fn process_value(&self, body: serde_json::Value) -> Result<RpcOutcome, ProxyError> {
        match body {
            serde_json::Value::Array(items) => {
                if items.len() > self.config.batch.max_batch {
                    let error =
                        ProxyError::BatchTooLarge { size: items.len(), max: self.config.batch.max_batch };
                    self.metrics.record_request(RequestKind::Batch, Err(&error));
                    return Err(error);
                }

                let calls = match items
                    .into_iter()
                    .map(JsonRpcRequest::from_value)
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(calls) => calls,
                    Err(e) => {
                        let error = ProxyError::from(e);
                        self.metrics.record_request(RequestKind::Batch, Err(&error));
                        return Err(error);
                    }
                };

                self.process_batch(calls).await
            }
            serde_json::Value::Object(_) => match JsonRpcRequest::from_value(body) {
                Ok(request) => self.process_request(request).await,
                Err(e) => {
                    let error = ProxyError::from(e);
                    self.metrics.record_request(RequestKind::Single, Err(&error));
                    Err(error)
                }
            },
            _ => {
                let error =
                    ProxyError::InvalidRequest("body must be a JSON object or array".to_string());
                self.metrics.record_request(RequestKind::Single, Err(&error));
                Err(error)
            }
        }
    }

    /// Forwards one call to an endpoint able to serve its method.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] with [`UpstreamError::NoEndpointAvailable`]
    /// when no endpoint qualifies, or whatever [`ProxyEngine::single_call`] fails with.
    pub async fn process_request(&self, request: JsonRpcRequest) -> Result<RpcOutcome, ProxyError> {
        let start = std::time::Instant::now();

        let result = async {
            let endpoint = self.selector.select(&request.method)?;
            let response = self.single_call(&endpoint, &request).await?;
            Ok::<_, ProxyError>(RpcOutcome {
                body: RpcBody::Single(response),
                served_by: ServedBy::Endpoint(endpoint.identity().clone()),
            })
        }
        .await;

        self.metrics.record_dispatch_duration(RequestKind::Single, start.elapsed());
        self.metrics.record_request(RequestKind::Single, result.as_ref().map(|_| ()));
        result
    }

    /// Plans, dispatches and reassembles a batch.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::BatchTooLarge`] or an empty-batch validation error
    /// from planning, or the first chunk failure from dispatch.
    pub async fn process_batch(&self, calls: Vec<JsonRpcRequest>) -> Result<RpcOutcome, ProxyError> {
        let start = std::time::Instant::now();
        let total = calls.len();

        let result = async {
            let chunks = batch::plan(calls, &self.config.batch)?;
            self.metrics.record_batch_size(total);

            tracing::debug!(calls = total, chunks = chunks.len(), "dispatching batch");
            let responses = self.dispatch(chunks, total).await?;

            Ok::<_, ProxyError>(RpcOutcome {
                body: RpcBody::Batch(responses),
                served_by: ServedBy::Batch,
            })
        }
        .await;

        self.metrics.record_dispatch_duration(RequestKind::Batch, start.elapsed());
        self.metrics.record_request(RequestKind::Batch, result.as_ref().map(|_| ()));
        result
    }

    /// Sends one JSON-RPC call to `endpoint` and returns an envelope carrying the client's id.
    ///
    /// # Errors
    ///
    /// - Transient transport errors once the retry policy is exhausted
    /// - [`UpstreamError::InvalidResponse`] for a body that is not a JSON-RPC reply,
    ///   including an object with neither `result` nor `error`
    /// - [`UpstreamError::RpcError`] when the reply carries an `error` object
    pub async fn single_call(
        &self,
        endpoint: &Endpoint,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, UpstreamError> {
        let outbound = request.with_id(request.id.as_ref().clone());

        let result = async {
            let body = serde_json::to_vec(&outbound)
                .map_err(|e| UpstreamError::InvalidResponse(format!("failed to encode call: {e}")))?;

            let bytes = self.send(endpoint.host.as_ref(), body).await?;

            let reply: JsonRpcResponse = serde_json::from_slice(&bytes)
                .map_err(|e| UpstreamError::InvalidResponse(format!("invalid JSON-RPC reply: {e}")))?;

            if let Some(error) = reply.error {
                return Err(UpstreamError::RpcError(error.code, error.message));
            }

            let result = reply.result.ok_or_else(missing_result)?;
            Ok::<_, UpstreamError>(JsonRpcResponse::success(result, Arc::clone(&request.id)))
        }
        .await;

        if let Err(e) = &result {
            self.record_failure(endpoint, &request.method, e);
        }
        result
    }

    /// Sends one chunk as an upstream batch to an endpoint chosen for the chunk's method.
    ///
    /// Each call goes out with its client-batch position as id; replies are matched
    /// back by that id and returned with the client's original ids.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::NoEndpointAvailable`] when no endpoint qualifies
    /// - [`UpstreamError::BatchItemError`] if any reply carries an `error` object
    /// - [`UpstreamError::InvalidResponse`] for a reply that is not an array, has the
    ///   wrong length, contains an unknown or repeated id, or has a member with
    ///   neither `result` nor `error`
    pub async fn chunk_call(
        &self,
        chunk: &Chunk,
    ) -> Result<Vec<(usize, JsonRpcResponse)>, UpstreamError> {
        let endpoint = self.selector.select(&chunk.method)?;

        let result = async {
            let outbound: Vec<JsonRpcRequest> = chunk
                .calls
                .iter()
                .map(|call| call.request.with_id(serde_json::Value::from(call.position)))
                .collect();

            let body = serde_json::to_vec(&outbound)
                .map_err(|e| UpstreamError::InvalidResponse(format!("failed to encode batch: {e}")))?;

            tracing::debug!(
                upstream = %endpoint.identity(),
                method = %chunk.method,
                calls = chunk.len(),
                "sending chunk"
            );

            let bytes = self.send(endpoint.host.as_ref(), body).await?;
            correlate_replies(chunk, &bytes)
        }
        .await;

        if let Err(e) = &result {
            self.record_failure(&endpoint, &chunk.method, e);
        }
        result
    }

    /// Runs every chunk concurrently and reassembles replies in client order.
    ///
    /// All chunks run to completion; the first failure (in plan order) is returned
    /// and no partial results are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] if any chunk failed, or
    /// [`ProxyError::Internal`] if a position in `0..total` was left unfilled.
    pub async fn dispatch(
        &self,
        chunks: Vec<Chunk>,
        total: usize,
    ) -> Result<Vec<JsonRpcResponse>, ProxyError> {
        let results = join_all(chunks.iter().map(|chunk| self.chunk_call(chunk))).await;

        let mut slots: Vec<Option<JsonRpcResponse>> = vec![None; total];
        for result in results {
            for (position, response) in result? {
                if let Some(slot) = slots.get_mut(position) {
                    *slot = Some(response);
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| {
                    ProxyError::Internal(format!("no reply assembled for batch position {position}"))
                })
            })
            .collect()
    }

    async fn send(&self, url: &str, body: Vec<u8>) -> Result<bytes::Bytes, UpstreamError> {
        self.http_client
            .send_request(url, bytes::Bytes::from(body), self.config.request_timeout, &self.config.retry)
            .await
    }

    fn record_failure(&self, endpoint: &Endpoint, method: &str, error: &UpstreamError) {
        tracing::warn!(
            upstream = %endpoint.identity(),
            method = %method,
            error = %error,
            "upstream call failed"
        );
        self.metrics.record_upstream_error(endpoint.identity(), error);
    }
}

fn missing_result() -> UpstreamError {
    UpstreamError::InvalidResponse("reply has neither result nor error".to_string())
}

fn correlate_replies(
    chunk: &Chunk,
    bytes: &[u8],
) -> Result<Vec<(usize, JsonRpcResponse)>, UpstreamError> {
    let replies: Vec<JsonRpcResponse> = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| UpstreamError::InvalidResponse(format!("invalid batch member: {e}")))?,
        Ok(_) => {
            return Err(UpstreamError::InvalidResponse("batch reply is not an array".to_string()))
        }
        Err(e) => return Err(UpstreamError::InvalidResponse(format!("invalid JSON: {e}"))),
    };

    if replies.len() != chunk.len() {
        return Err(UpstreamError::InvalidResponse(format!(
            "batch reply has {} members, expected {}",
            replies.len(),
            chunk.len()
        )));
    }

    let mut pending: AHashMap<usize, &Arc<serde_json::Value>> =
        chunk.calls.iter().map(|call| (call.position, &call.request.id)).collect();

    replies
        .into_iter()
        .map(|reply| {
            if let Some(error) = reply.error {
                return Err(UpstreamError::BatchItemError(format!(
                    "{} ({})",
                    error.message, error.code
                )));
            }

            let position = reply
                .id
                .as_u64()
                .and_then(|id| usize::try_from(id).ok())
                .ok_or_else(|| {
                    UpstreamError::InvalidResponse(format!("unexpected reply id {}", reply.id))
                })?;

            let client_id = pending.remove(&position).ok_or_else(|| {
                UpstreamError::InvalidResponse(format!("unmatched reply id {position}"))
            })?;

            let result = reply.result.ok_or_else(missing_result)?;
            Ok((position, JsonRpcResponse::success(result, Arc::clone(client_id))))
        })
        .collect()
}
