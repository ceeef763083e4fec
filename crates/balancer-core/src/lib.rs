//! # Balancer Core
//!
//! Core library for a weighted, capability-aware JSON-RPC load balancer in
//! front of a cluster of Steem nodes.
//!
//! - **[`upstream`]**: endpoint registry, plugin/alias rules, weighted selection and the
//!   shared HTTP client with its retry policy.
//! - **[`proxy`]**: request validation, batch planning and all-or-nothing concurrent dispatch.
//! - **[`config`]**: layered application configuration.
//! - **[`metrics`]**: Prometheus counters and histograms.
//!
//! ## Request Flow
//!
//! ```text
//! body ──► ProxyEngine::process_value
//!             │
//!             ├─ single ──► WeightedSelector::select ──► single_call
//!             │
//!             └─ batch ───► batch::plan ──► dispatch (join_all over chunk_call)
//!                                              │
//!                                              ▼
//!                                   replies in client order
//! ```

pub mod config;
pub mod metrics;
pub mod proxy;
pub mod types;
pub mod upstream;
