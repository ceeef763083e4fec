use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use rand::Rng;

use super::{capability::can_call, endpoint::Endpoint, errors::UpstreamError, registry::EndpointRegistry};

/// Endpoint references eligible for one method, each repeated `weight` times.
pub type WeightedPool = Arc<Vec<Arc<Endpoint>>>;

/// Weighted random endpoint selection with a per-method pool cache.
///
/// Pools are a pure function of the registry and the method, so they are
/// computed once per method and never expire. Concurrent cache misses for the
/// same method compute equal pools and the last insert wins harmlessly.
///
/// The cache is keyed by the method string exactly as the client sent it, so
/// every distinct method name that reaches the selector adds one entry. Entries
/// are only dropped by [`WeightedSelector::reload`].
///
/// The registry sits behind an `ArcSwap` so [`WeightedSelector::reload`] can
/// replace it without blocking readers.
pub struct WeightedSelector {
    registry: ArcSwap<EndpointRegistry>,
    pools: DashMap<String, WeightedPool>,
}

impl WeightedSelector {
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry: ArcSwap::new(registry), pools: DashMap::new() }
    }

    /// Current registry snapshot.
    #[must_use]
    pub fn registry(&self) -> Arc<EndpointRegistry> {
        self.registry.load_full()
    }

    /// Returns the weighted pool for `method`, computing and caching it on first use.
    #[must_use]
    pub fn weighted_pool(&self, method: &str) -> WeightedPool {
        if let Some(pool) = self.pools.get(method) {
            return pool.clone();
        }

        let registry = self.registry.load_full();
        let pool = Arc::new(build_pool(&registry, method));

        // Skip caching if a reload raced with this computation.
        if Arc::ptr_eq(&registry, &self.registry.load()) {
            self.pools.insert(method.to_string(), pool.clone());
        }

        tracing::debug!(method = %method, pool_size = pool.len(), "computed weighted pool");
        pool
    }

    /// Picks an endpoint for `method` uniformly at random from its weighted pool.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::NoEndpointAvailable`] when no endpoint may serve the method.
    pub fn select(&self, method: &str) -> Result<Arc<Endpoint>, UpstreamError> {
        let pool = self.weighted_pool(method);

        if pool.is_empty() {
            tracing::warn!(method = %method, "no endpoint available for method");
            return Err(UpstreamError::NoEndpointAvailable(method.to_string()));
        }

        let index = rand::rng().random_range(0..pool.len());
        let endpoint = pool[index].clone();

        tracing::trace!(method = %method, upstream = %endpoint.identity(), "selected endpoint");
        Ok(endpoint)
    }

    /// Replaces the registry and drops every cached pool.
    pub fn reload(&self, registry: Arc<EndpointRegistry>) {
        self.registry.store(registry);
        self.pools.clear();
        tracing::info!("endpoint registry reloaded, pool cache cleared");
    }

    /// Methods that currently have a cached pool.
    #[must_use]
    pub fn cached_methods(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }
}

fn build_pool(registry: &EndpointRegistry, method: &str) -> Vec<Arc<Endpoint>> {
    let mut pool = Vec::new();
    for (_, endpoint) in registry.all() {
        if !can_call(endpoint, method) {
            continue;
        }
        pool.extend(std::iter::repeat_n(endpoint.clone(), endpoint.weight as usize));
    }
    pool
}
