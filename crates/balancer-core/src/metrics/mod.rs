//! Prometheus metrics for request dispatch.
//!
//! Counters and histograms go through the `metrics` facade and are rendered
//! by a process-wide Prometheus recorder installed on first use.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `rpc_requests_total` | counter | `kind` (single/batch), `outcome` (ok/client_error/upstream_error) |
//! | `rpc_upstream_errors_total` | counter | `upstream`, `error` |
//! | `rpc_batch_size` | histogram | |
//! | `rpc_dispatch_duration_seconds` | histogram | `kind` |
//!
//! Upstream identities come from the operator's registry, so their label
//! cardinality is bounded. Method names are client-controlled and never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{sync::OnceLock, time::Duration};

use crate::{proxy::errors::ProxyError, upstream::errors::UpstreamError};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to install global Prometheus recorder, using a detached one"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Request shape label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Single,
    Batch,
}

impl RequestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
        }
    }
}

/// Thin handle over the global recorder.
#[derive(Clone)]
pub struct MetricsCollector {
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self { prometheus_handle: init_prometheus_recorder() }
    }

    /// Records a finished inbound request.
    pub fn record_request(&self, kind: RequestKind, result: Result<(), &ProxyError>) {
        let outcome = match result {
            Ok(()) => "ok",
            Err(e) if e.is_client_error() => "client_error",
            Err(_) => "upstream_error",
        };
        counter!("rpc_requests_total", "kind" => kind.as_str(), "outcome" => outcome).increment(1);
    }

    /// Records an upstream failure attributed to `upstream`.
    pub fn record_upstream_error(&self, upstream: &str, error: &UpstreamError) {
        counter!(
            "rpc_upstream_errors_total",
            "upstream" => upstream.to_string(),
            "error" => error.kind()
        )
        .increment(1);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn record_batch_size(&self, size: usize) {
        histogram!("rpc_batch_size").record(size as f64);
    }

    pub fn record_dispatch_duration(&self, kind: RequestKind, elapsed: Duration) {
        histogram!("rpc_dispatch_duration_seconds", "kind" => kind.as_str())
            .record(elapsed.as_secs_f64());
    }

    /// Renders all metrics in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
