//! Dispatch error taxonomy.
//!
//! - configuration errors are surfaced as-is and never retried
//!   automatically;
//! - store errors are retryable by the calling controller;
//! - partial failures join per-item errors from a set pass, with
//!   successfully processed siblings left applied;
//! - capacity errors are fatal to the pass.

use std::fmt;

use thiserror::Error;

use depfleet_store::{ObjectKey, OwnerRef, StoreError};

use crate::apply::ApplyError;
use crate::schedule::ScheduleError;

/// Errors surfaced by a dispatch pass.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed user-supplied configuration (discovered-set payload,
    /// derived names).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed schedule expression.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Object store failure; the caller applies its retry policy.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Idempotent apply failure, tagged with the failing phase.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Joined per-item failures from a set reconciliation pass.
    #[error(transparent)]
    Partial(#[from] PartialFailure),

    /// A derived child name collides with an object held by a different
    /// or absent owner. The colliding object is left untouched.
    #[error("{key} exists but is not owned by {owner}, refusing to adopt")]
    ForeignOwner { key: ObjectKey, owner: OwnerRef },

    /// Discovered set produces more execution units than the completion
    /// index can represent.
    #[error("{units} execution units exceed the representable index range")]
    MaxCapacity { units: usize },
}

impl DispatchError {
    /// True for errors the calling controller should not retry.
    pub fn is_config(&self) -> bool {
        matches!(self, DispatchError::Config(_) | DispatchError::Schedule(_))
    }
}

/// A join of per-item errors; one bad item never blocks its siblings.
#[derive(Debug)]
pub struct PartialFailure {
    pub errors: Vec<DispatchError>,
}

impl PartialFailure {
    pub fn new(errors: Vec<DispatchError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} item(s) failed: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_joins_messages() {
        let err = PartialFailure::new(vec![
            DispatchError::Config("bad name".into()),
            DispatchError::MaxCapacity { units: 9 },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 item(s) failed"));
        assert!(text.contains("bad name"));
        assert!(text.contains("9 execution units"));
    }

    #[test]
    fn config_classification() {
        assert!(DispatchError::Config("x".into()).is_config());
        assert!(!DispatchError::MaxCapacity { units: 1 }.is_config());
    }
}
