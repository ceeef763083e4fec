use anyhow::Result;
use axum::serve;
use balancer_core::{
    config::AppConfig,
    metrics::MetricsCollector,
    proxy::{EngineConfig, ProxyEngine},
    upstream::{EndpointRegistry, HttpClient, WeightedSelector},
};
use server::{create_app, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("warn,balancer_core={level},server={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

fn init_engine(config: &AppConfig, metrics: MetricsCollector) -> Result<Arc<ProxyEngine>> {
    let registry = EndpointRegistry::from_file(&config.nodes_file)
        .map_err(|e| anyhow::anyhow!("Failed to load nodes from {}: {e}", config.nodes_file))?;

    if registry.is_empty() {
        anyhow::bail!("No endpoints configured in {}", config.nodes_file);
    }

    for (identity, endpoint) in registry.all() {
        debug!(
            upstream = %identity,
            host = %endpoint.host,
            weight = endpoint.weight,
            full = endpoint.full,
            "endpoint registered"
        );
    }
    info!(endpoints_count = registry.len(), "Endpoint registry loaded");

    let http_client = HttpClient::with_config(config.http_client_config())
        .map_err(|e| anyhow::anyhow!("HTTP client initialization failed: {e}"))?;
    let selector = WeightedSelector::new(Arc::new(registry));

    Ok(Arc::new(ProxyEngine::new(
        Arc::new(selector),
        Arc::new(http_client),
        metrics,
        EngineConfig::from(config),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    init_logging(&config);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    info!("Starting steem-balancer");
    debug!(
        nodes_file = %config.nodes_file,
        max_batch = config.batch.max_batch,
        chunk_size = config.batch.chunk_size,
        retry_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let metrics = MetricsCollector::new();
    let engine = init_engine(&config, metrics.clone())?;

    let state = AppState { engine, metrics: config.metrics.enabled.then_some(metrics) };
    let app = create_app(state, &config.server);

    let addr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "RPC server listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
