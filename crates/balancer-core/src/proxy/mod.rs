//! Request processing: validation, batch planning and concurrent dispatch.
//!
//! # Request Processing Flow
//!
//! ```text
//! Client body
//!       │
//!       ▼
//! ┌──────────────┐
//! │  Validation  │ ─── Invalid ──► ProxyError (400)
//! └──────┬───────┘
//!        │
//!   ┌────┴─────┐
//!   ▼          ▼
//! Single     Batch ──► MAX_BATCH gate ──► group by method ──► chunk
//!   │          │
//!   ▼          ▼
//! select    join_all(chunk_call) ──► any failure ──► ProxyError (502)
//!   │          │
//!   ▼          ▼
//! single_call  reassemble in client order
//! ```

pub mod batch;
pub mod engine;
pub mod errors;
pub mod validation;

pub use engine::{EngineConfig, ProxyEngine};
pub use errors::ProxyError;
pub use validation::ValidationError;
