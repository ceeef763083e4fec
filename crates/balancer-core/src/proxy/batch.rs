//! Batch partitioning: group calls by method, then split each group into
//! balanced chunks that are forwarded upstream as one batch each.
//!
//! The chunk target size controls the *number* of pieces; the piece size is
//! derived from it so load spreads evenly. 200 calls with a target of 40 give
//! five chunks of 40; 41 calls give two chunks of 21 and 20.

use ahash::AHashMap;

use crate::{
    config::BatchConfig,
    proxy::{errors::ProxyError, validation::ValidationError},
    types::JsonRpcRequest,
};

/// One call of a client batch, remembering where it was in that batch.
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub position: usize,
    pub request: JsonRpcRequest,
}

/// Contiguous run of same-method calls destined for one upstream batch call.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub method: String,
    pub calls: Vec<PlannedCall>,
}

impl Chunk {
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Groups calls by method.
///
/// Order is stable within each group, and groups are ordered by the first
/// appearance of their method.
#[must_use]
pub fn group_by_method(calls: Vec<PlannedCall>) -> Vec<(String, Vec<PlannedCall>)> {
    let mut groups: Vec<(String, Vec<PlannedCall>)> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();

    for call in calls {
        if let Some(&slot) = index.get(&call.request.method) {
            groups[slot].1.push(call);
        } else {
            index.insert(call.request.method.clone(), groups.len());
            groups.push((call.request.method.clone(), vec![call]));
        }
    }

    groups
}

/// Splits a group into `ceil(len / target)` contiguous pieces of `ceil(len / n)` items.
///
/// A group no larger than the target stays whole. A `target` of zero is treated as one.
#[must_use]
pub fn chunk<T>(group: Vec<T>, target: usize) -> Vec<Vec<T>> {
    let len = group.len();
    if len == 0 {
        return Vec::new();
    }

    let target = target.max(1);
    let pieces = if len > target { len.div_ceil(target) } else { 1 };
    let piece_size = len.div_ceil(pieces);

    let mut chunks = Vec::with_capacity(pieces);
    let mut remaining = group.into_iter();
    loop {
        let piece: Vec<T> = remaining.by_ref().take(piece_size).collect();
        if piece.is_empty() {
            break;
        }
        chunks.push(piece);
    }
    chunks
}

/// Plans a client batch: enforces the size gate, groups by method and chunks each group.
///
/// # Errors
///
/// Returns [`ProxyError::Validation`] with [`ValidationError::EmptyBatch`] for an
/// empty batch and [`ProxyError::BatchTooLarge`] when the batch exceeds `max_batch`.
pub fn plan(calls: Vec<JsonRpcRequest>, config: &BatchConfig) -> Result<Vec<Chunk>, ProxyError> {
    if calls.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }

    if calls.len() > config.max_batch {
        return Err(ProxyError::BatchTooLarge { size: calls.len(), max: config.max_batch });
    }

    let planned = calls
        .into_iter()
        .enumerate()
        .map(|(position, request)| PlannedCall { position, request })
        .collect();

    let chunks: Vec<Chunk> = group_by_method(planned)
        .into_iter()
        .flat_map(|(method, group)| {
            chunk(group, config.chunk_size)
                .into_iter()
                .map(move |calls| Chunk { method: method.clone(), calls })
        })
        .collect();

    tracing::debug!(chunks = chunks.len(), "planned batch");
    Ok(chunks)
}
