//! Store error types.

use thiserror::Error;

use crate::meta::ObjectKey;
use crate::object::Kind;

/// Errors surfaced by the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed object does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    /// An object with this key already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    /// Optimistic concurrency check failed on update.
    #[error("conflict writing {kind} {key}: expected version {expected}, found {actual}")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    /// Object body failed to serialize or deserialize.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the error is a tolerable "object absent" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
