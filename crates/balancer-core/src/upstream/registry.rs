//! Endpoint registry loaded from a `nodes.json` style source.
//!
//! Two source shapes are accepted:
//!
//! ```json
//! ["https://steemd.privex.io", "https://api.steemit.com"]
//! ```
//!
//! ```json
//! {
//!   "privex": {"host": "https://steemd.privex.io", "weight": 3, "plugins": ["condenser_api"]},
//!   "light": {"host": "https://light.example", "full": false}
//! }
//! ```
//!
//! A list entry is keyed by its host. A mapping entry is keyed by its `name`
//! when one is given, otherwise by the mapping key.

use ahash::AHashMap;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use thiserror::Error;
use url::Url;

use super::endpoint::Endpoint;

/// Default location of the registry source, relative to the working directory.
pub const DEFAULT_NODES_FILE: &str = "configs/nodes.json";

/// Largest accepted endpoint weight.
///
/// The selector replicates each endpoint `weight` times in a method's pool.
pub const MAX_WEIGHT: u32 = 10_000;

/// Errors raised while loading the endpoint registry. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("endpoint '{name}' has invalid weight {weight}: must be between 1 and {max}", max = MAX_WEIGHT)]
    InvalidWeight { name: String, weight: i64 },

    #[error("endpoint '{name}' has malformed host '{host}': {reason}")]
    MalformedHost { name: String, host: String, reason: String },

    #[error("duplicate endpoint name '{0}'")]
    Duplicate(String),

    #[error("failed to read nodes file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid nodes source: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw registry source as found on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodesSource {
    /// Flat list of host URLs.
    List(Vec<String>),
    /// Mapping of key to endpoint attributes; sorted by key.
    Map(BTreeMap<String, EndpointSpec>),
}

/// Attributes of one mapping entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSpec {
    pub host: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Defaults to 1; must lie in `1..=MAX_WEIGHT`.
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub full: Option<bool>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub call_whitelist: Vec<String>,
    #[serde(default)]
    pub call_blacklist: Vec<String>,
}

/// Immutable set of configured backends.
///
/// Iteration order is stable: list order for list sources, key order for
/// mapping sources.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<(Arc<str>, Arc<Endpoint>)>,
    index: AHashMap<Arc<str>, usize>,
}

impl EndpointRegistry {
    /// Builds the registry from a parsed source.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidWeight`] for a weight outside `1..=MAX_WEIGHT`,
    /// [`RegistryError::MalformedHost`] for a host that is not an absolute
    /// http(s) URL, and [`RegistryError::Duplicate`] when two entries share a key.
    pub fn load(source: NodesSource) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        match source {
            NodesSource::List(hosts) => {
                for host in hosts {
                    validate_host(&host, &host)?;
                    registry.insert(host.clone(), Endpoint::new(host))?;
                }
            }
            NodesSource::Map(entries) => {
                for (key, spec) in entries {
                    let name = spec.name.clone().unwrap_or(key);
                    let endpoint = build_endpoint(&name, spec)?;
                    registry.insert(name, endpoint)?;
                }
            }
        }

        tracing::debug!(endpoints = registry.len(), "loaded endpoint registry");
        Ok(registry)
    }

    /// Parses and loads a JSON registry source.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for invalid JSON or an unknown shape, or
    /// any error from [`EndpointRegistry::load`].
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let source: NodesSource = serde_json::from_str(json)?;
        Self::load(source)
    }

    /// Reads and loads a JSON registry file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read, or any error from
    /// [`EndpointRegistry::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| RegistryError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&content)
    }

    /// Builds a registry from already constructed endpoints, keyed by identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when two endpoints share an identity,
    /// or [`RegistryError::InvalidWeight`] for a weight outside `1..=MAX_WEIGHT`.
    pub fn from_endpoints(
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for endpoint in endpoints {
            let key = endpoint.identity().to_string();
            checked_weight(&key, i64::from(endpoint.weight))?;
            registry.insert(key, endpoint)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, key: String, endpoint: Endpoint) -> Result<(), RegistryError> {
        let key: Arc<str> = Arc::from(key);
        if self.index.contains_key(&key) {
            return Err(RegistryError::Duplicate(key.to_string()));
        }
        self.index.insert(key.clone(), self.endpoints.len());
        self.endpoints.push((key, Arc::new(endpoint)));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.index.get(name).map(|&position| &self.endpoints[position].1)
    }

    /// All endpoints with their registry keys, in registry order.
    pub fn all(&self) -> impl Iterator<Item = (&Arc<str>, &Arc<Endpoint>)> {
        self.endpoints.iter().map(|(key, endpoint)| (key, endpoint))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn build_endpoint(name: &str, spec: EndpointSpec) -> Result<Endpoint, RegistryError> {
    validate_host(name, &spec.host)?;

    let weight = checked_weight(name, spec.weight.unwrap_or(1))?;

    let mut endpoint = Endpoint::new(spec.host)
        .with_weight(weight)
        .with_full(spec.full.unwrap_or(true))
        .with_plugins(spec.plugins)
        .with_whitelist(spec.call_whitelist)
        .with_blacklist(spec.call_blacklist);

    if let Some(display) = spec.name {
        endpoint = endpoint.with_name(display);
    }

    Ok(endpoint)
}

fn checked_weight(name: &str, raw_weight: i64) -> Result<u32, RegistryError> {
    u32::try_from(raw_weight)
        .ok()
        .filter(|weight| (1..=MAX_WEIGHT).contains(weight))
        .ok_or_else(|| RegistryError::InvalidWeight { name: name.to_string(), weight: raw_weight })
}

fn validate_host(name: &str, host: &str) -> Result<(), RegistryError> {
    let malformed = |reason: String| RegistryError::MalformedHost {
        name: name.to_string(),
        host: host.to_string(),
        reason,
    };

    let url = Url::parse(host).map_err(|e| malformed(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(malformed(format!("unsupported scheme '{}'", url.scheme())));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(malformed("missing host".to_string()));
    }

    Ok(())
}
