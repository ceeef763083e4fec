//! Integration tests for the Steem RPC load balancer.
//!
//! - `dispatch_tests`: engine behaviour against mock upstreams (retry, all-or-nothing
//!   batches, id echo, ordering)
//! - `http_tests`: the full request path through the axum router
//! - `mock_infrastructure`: reusable mockito-based Steem node mocks
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod dispatch_tests;

#[cfg(test)]
mod http_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
