//! Batch partitioning: maps N discovered repositories and M parallel
//! workers to a set of indexed work units.
//!
//! Batch index doubles as the worker assignment key for indexed
//! completions, so given the same discovered list and configuration the
//! output must be byte-for-byte reproducible.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::resources::BatchStrategy;

/// Smallest auto-derived batch size.
pub const MIN_AUTO_BATCH_SIZE: i64 = 1;

/// Largest auto-derived batch size.
pub const MAX_AUTO_BATCH_SIZE: i64 = 50;

/// An ordered, non-empty slice of repository identifiers with a stable
/// 0-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub repositories: Vec<String>,
}

/// Wire entry for the config record payloads: both the per-batch and the
/// per-slot arrays serialize as `[{"repositories": [...]}, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub repositories: Vec<String>,
}

/// Compute the batch size for a repository count.
///
/// An explicit positive size wins verbatim. Otherwise the size is
/// `total / (instances * 3)` clamped to `[1, 50]`, spreading roughly three
/// batches per worker so a slow batch does not stall the whole dispatch.
pub fn compute_batch_size(total_repos: usize, explicit: Option<i32>, instances: i32) -> i32 {
    if let Some(size) = explicit {
        if size > 0 {
            return size;
        }
    }
    let instances = instances.max(1) as usize;
    let auto = (total_repos / (instances * 3)) as i64;
    auto.clamp(MIN_AUTO_BATCH_SIZE, MAX_AUTO_BATCH_SIZE) as i32
}

/// Split the ordered repository list into batches.
///
/// Strategy `None` yields a single batch with everything; strategy `Batch`
/// yields consecutive chunks of the computed size with a possibly-short
/// final chunk. An empty list yields no batches under either strategy.
pub fn create_batches(
    strategy: BatchStrategy,
    repos: &[String],
    explicit: Option<i32>,
    instances: i32,
) -> Vec<Batch> {
    if repos.is_empty() {
        return Vec::new();
    }
    match strategy {
        BatchStrategy::None => vec![Batch {
            index: 0,
            repositories: repos.to_vec(),
        }],
        BatchStrategy::Batch => {
            let size = compute_batch_size(repos.len(), explicit, instances) as usize;
            repos
                .chunks(size)
                .enumerate()
                .map(|(index, chunk)| Batch {
                    index,
                    repositories: chunk.to_vec(),
                })
                .collect()
        }
    }
}

/// Number of completions for an indexed dispatch of these batches.
pub fn completion_count(batches: &[Batch]) -> Result<i32, DispatchError> {
    i32::try_from(batches.len()).map_err(|_| DispatchError::MaxCapacity {
        units: batches.len(),
    })
}

/// One wire entry per batch.
pub fn batch_entries(batches: &[Batch]) -> Vec<BatchEntry> {
    batches
        .iter()
        .map(|b| BatchEntry {
            repositories: b.repositories.clone(),
        })
        .collect()
}

/// One wire entry per indexed execution slot, a single repository each.
pub fn slot_entries(repos: &[String]) -> Vec<BatchEntry> {
    repos
        .iter()
        .map(|id| BatchEntry {
            repositories: vec![id.clone()],
        })
        .collect()
}
