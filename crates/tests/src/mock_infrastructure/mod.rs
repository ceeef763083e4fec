//! Mock infrastructure for testing the balancer against fake Steem nodes.
//!
//! - `SteemNodeMock`: wraps mockito with Steem-flavoured reply builders
//! - Test helpers that wire endpoints, engine and router together
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{engine_for, SteemNodeMock};
//!
//! let mut node = SteemNodeMock::new().await;
//! node.mock_echo();
//!
//! let engine = engine_for(vec![node.endpoint("node-a")]);
//! ```

pub mod test_helpers;

pub use rpc_mock::{echo_reply, SteemNodeMock};
pub use test_helpers::*;
