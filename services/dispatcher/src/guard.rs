//! Active-work guard: best-effort mutual exclusion for dispatch.
//!
//! Lists the execution units labeled for a work group and reports whether
//! any is still unfinished (see [`Job::is_active`] for the conservative
//! activity definition). This is a poll-then-act check, not a lock: two
//! overlapping passes can both observe "not active" and both dispatch, so
//! the overall semantics are at-least-once.

use depfleet_store::{Kind, ListFilter, ObjectStore, StoreError};
use tracing::debug;

use crate::resources::{Job, WorkGroup, LABEL_WORK_GROUP};

/// True when unfinished work already exists for this group.
pub async fn has_active_work(
    store: &dyn ObjectStore,
    group: &WorkGroup,
) -> Result<bool, StoreError> {
    let filter = ListFilter::default().with_label(LABEL_WORK_GROUP, &group.meta.name);
    let units = store
        .list(Kind::Job, &group.meta.namespace, &filter)
        .await?;

    for raw in units {
        let job: Job = raw.decode()?;
        if job.is_active() {
            debug!(
                job = %raw.key(),
                active = job.status.active,
                succeeded = job.status.succeeded,
                failed = job.status.failed,
                "unfinished execution unit found"
            );
            return Ok(true);
        }
    }
    Ok(false)
}
