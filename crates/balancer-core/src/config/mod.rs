//! Balancer settings, layered from several sources.
//!
//! # Sources
//!
//! Later sources override earlier ones:
//!
//! 1. **Compiled defaults**: the `Default` impls below
//! 2. **Config file**: TOML file specified by the `BALANCER_CONFIG` env var
//! 3. **Environment variables**: `BALANCER__SECTION__KEY` overrides specific fields
//! 4. **Legacy variables**: `MAX_BATCH` and `CHUNK_SIZE` still override the batch limits
//!
//! # Example
//!
//! ```toml
//! nodes_file = "configs/nodes.json"
//!
//! [server]
//! bind_address = "0.0.0.0"
//! bind_port = 5000
//!
//! [batch]
//! max_batch = 3000
//! chunk_size = 40
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 100
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::upstream::{registry::DEFAULT_NODES_FILE, retry::RetryPolicy, HttpClientConfig};

/// Listener and request-handling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address. Defaults to `127.0.0.1`.
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `5000`.
    pub bind_port: u16,

    /// Maximum number of inbound requests handled at once. Defaults to `500`.
    pub max_concurrent_requests: usize,

    /// Per-call upstream timeout in seconds. Defaults to `120`.
    pub request_timeout_seconds: u64,

    /// Maximum number of concurrent outbound upstream requests. Defaults to `1000`.
    pub upstream_concurrency: usize,

    /// Maximum inbound body size in bytes. Defaults to 16 MiB.
    pub max_body_bytes: usize,
}

/// Batch gate and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Largest accepted client batch. Defaults to `3000`.
    pub max_batch: usize,

    /// Target number of calls per upstream batch. Defaults to `40`.
    pub chunk_size: usize,
}

/// `/metrics` exposure.
///
/// When enabled, metrics are exposed at `/metrics` on the main listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Log sink settings, applied unless `RUST_LOG` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the balancer's own targets. Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path of the endpoint registry source. Defaults to `configs/nodes.json`.
    pub nodes_file: String,
    pub server: ServerConfig,
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 5000,
            max_concurrent_requests: 500,
            request_timeout_seconds: 120,
            upstream_concurrency: 1000,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_batch: 3000, chunk_size: 40 }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nodes_file: DEFAULT_NODES_FILE.to_string(),
            server: ServerConfig::default(),
            batch: BatchConfig::default(),
            retry: RetryPolicy::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Builds the configuration from `config_path` plus the environment.
    ///
    /// Use `__` as a separator for nested fields (e.g., `BALANCER__BATCH__CHUNK_SIZE=20`).
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or a value has the wrong type.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config_builder = Config::builder()
            .set_default("nodes_file", defaults.nodes_file)?
            .set_default("server.bind_address", defaults.server.bind_address)?
            .set_default("server.bind_port", i64::from(defaults.server.bind_port))?
            .set_default("server.request_timeout_seconds", defaults.server.request_timeout_seconds)?
            .set_default("batch.max_batch", 3000)?
            .set_default("batch.chunk_size", 40)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("BALANCER").separator("__"))
            .set_override_option("batch.max_batch", std::env::var("MAX_BATCH").ok())?
            .set_override_option("batch.chunk_size", std::env::var("CHUNK_SIZE").ok())?
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads `config/config.toml`, or the file named by `BALANCER_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as [`AppConfig::from_file`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("BALANCER_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Listen address as a [`SocketAddr`].
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending address if it does not parse.
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Per-call upstream timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// HTTP client settings derived from the server section.
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            concurrent_limit: self.server.upstream_concurrency,
            ..HttpClientConfig::default()
        }
    }

    /// Rejects settings the balancer cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes_file.is_empty() {
            return Err("nodes_file must not be empty".to_string());
        }

        if self.batch.max_batch == 0 {
            return Err("Max batch must be greater than 0".to_string());
        }

        if self.batch.chunk_size == 0 {
            return Err("Chunk size must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry max_attempts must be at least 1".to_string());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err("Retry base_delay_ms must not exceed max_delay_ms".to_string());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }

        if self.server.max_concurrent_requests == 0 || self.server.upstream_concurrency == 0 {
            return Err("Concurrency limits must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
