//! Upstream Steem node management and selection.
//!
//! This module owns everything that knows about backends:
//! - The immutable endpoint registry loaded from `nodes.json`
//! - Capability rules deciding which endpoint may serve which method
//! - Weighted random selection with a per-method pool cache
//! - The shared HTTP client and its retry policy
//!
//! # Selection Flow
//!
//! ```text
//! method ──► WeightedSelector::weighted_pool (cached)
//!                 │ miss
//!                 ▼
//!            registry.all() ──► can_call(endpoint, method) ──► repeat `weight` times
//!                 │
//!                 ▼
//!            uniform random index ──► Arc<Endpoint>
//! ```

pub mod capability;
pub mod endpoint;
pub mod errors;
pub mod http_client;
pub mod registry;
pub mod retry;
pub mod selector;

pub use endpoint::Endpoint;
pub use errors::UpstreamError;
pub use http_client::{HttpClient, HttpClientConfig};
pub use registry::{EndpointRegistry, NodesSource, RegistryError, MAX_WEIGHT};
pub use retry::RetryPolicy;
pub use selector::WeightedSelector;
