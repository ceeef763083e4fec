//! Tower layers wrapped around the RPC router.

pub mod correlation_id;

pub use correlation_id::{create_request_id_layers, request_id, UuidRequestIdGenerator, X_REQUEST_ID};
