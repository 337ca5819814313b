//! Dispatch orchestrator: the end-to-end decision for one work group pass.
//!
//! A pass walks: suspend check → schedule evaluation → active-work guard →
//! partitioning → applying child resources → recording the result. The
//! guard-blocked path is a first-class requeue outcome, never an error, so
//! the calling controller can distinguish "try again later" from "apply
//! your backoff policy".
//!
//! One pass per work group runs at a time, invoked by the external
//! controller; distinct groups may be reconciled concurrently with no
//! shared mutable state between them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use depfleet_store::{Kind, ListFilter, ObjectKey, ObjectStore, OwnerRef, RawObject};
use tracing::{debug, info, instrument, warn};

use crate::apply::{apply, ApplyResult};
use crate::batch::{self, Batch};
use crate::discovery;
use crate::error::DispatchError;
use crate::guard;
use crate::resources::{
    CompletionMode, ConfigRecord, Job, Operation, Repository, Run, RunPhase, WorkGroup,
    ANNOTATION_DISPATCH_OPERATION, KEY_BATCHES, KEY_SLOTS, LABEL_WORK_GROUP,
};
use crate::schedule::{self, Decision, DueReason};
use crate::sets;

/// Fixed delay requested when the guard observes unfinished work.
pub const REQUEUE_DELAY: Duration = Duration::from_secs(60);

/// Why a pass ended without dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The work group no longer exists.
    NotFound,
    /// The suspend flag is set.
    Suspended,
    /// Neither the override nor the periodic schedule fired.
    NotDue,
}

/// What a dispatch pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub operation: Operation,
    pub repositories: usize,
    pub batches: usize,
    pub children_applied: usize,
    pub children_pruned: usize,
    pub stale_runs_pruned: usize,
}

/// Tri-state pass outcome. Requeue and skip are success, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Requeue(Duration),
    Dispatched(DispatchStats),
}

/// Composes schedule evaluation, the active-work guard, partitioning, and
/// the idempotent appliers into one reconciliation pass per work group.
pub struct DispatchOrchestrator {
    store: Arc<dyn ObjectStore>,
}

impl DispatchOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Run a single reconciliation pass for the work group at `key`.
    #[instrument(skip(self), fields(group = %key))]
    pub async fn run_pass(
        &self,
        key: &ObjectKey,
        now: DateTime<Utc>,
    ) -> Result<Outcome, DispatchError> {
        let store = self.store.as_ref();

        let Some(raw) = store.get(Kind::WorkGroup, key).await? else {
            return Ok(Outcome::Skipped(SkipReason::NotFound));
        };
        let group: WorkGroup = raw.decode().map_err(DispatchError::Store)?;

        if group.spec.suspend {
            debug!("work group suspended");
            return Ok(Outcome::Skipped(SkipReason::Suspended));
        }

        if let Some(value) = group.meta.annotations.get(ANNOTATION_DISPATCH_OPERATION) {
            if Operation::parse(value).is_none() {
                warn!(value, "unrecognized dispatch operation annotation, ignoring");
            }
        }

        let decision = schedule::evaluate(&group, now)?;
        let Decision::Due(reason) = decision else {
            debug!("not due");
            return Ok(Outcome::Skipped(SkipReason::NotDue));
        };

        if guard::has_active_work(store, &group).await? {
            info!(delay_secs = REQUEUE_DELAY.as_secs(), "unfinished work present, requeueing");
            return Ok(Outcome::Requeue(REQUEUE_DELAY));
        }

        let repos = discovery::discovered_repositories(store, &group).await?;
        let owner = group.owner_ref();
        let namespace = group.meta.namespace.clone();
        let group_name = group.meta.name.clone();

        // Mirror the discovered set as owned repository records.
        let set_outcome = sets::reconcile_owned::<Repository, _>(
            store,
            &namespace,
            &owner,
            &repos,
            |id, record| {
                record.spec.source_id = id.to_string();
                record
                    .meta
                    .labels
                    .insert(LABEL_WORK_GROUP.to_string(), group_name.clone());
            },
        )
        .await?;

        let batches = batch::create_batches(
            group.spec.strategy,
            &repos,
            group.spec.batch_size,
            group.spec.parallelism,
        );
        let completions = batch::completion_count(&batches)?;

        self.apply_dispatch_config(&group, &owner, &repos, &batches)
            .await?;

        let mut stats = DispatchStats {
            repositories: repos.len(),
            batches: batches.len(),
            children_applied: set_outcome.applied,
            children_pruned: set_outcome.pruned,
            ..DispatchStats::default()
        };

        match reason {
            DueReason::Override(op) => {
                stats.operation = op;
                self.apply_manual_job(&group, &owner, op).await?;
            }
            DueReason::FirstRun | DueReason::Periodic => {
                stats.operation = Operation::Renovate;
                if batches.is_empty() {
                    debug!("nothing discovered, no execution unit applied");
                } else {
                    let result = self.apply_periodic_job(&group, &owner, completions).await?;
                    if result == ApplyResult::Updated {
                        // The template changed under previously dispatched
                        // work; stale pending units must not run the old
                        // definition.
                        stats.stale_runs_pruned = self.prune_pending_runs(&group).await?;
                    }
                }
            }
        }

        self.record_result(raw, now).await?;

        info!(
            operation = stats.operation.as_str(),
            repositories = stats.repositories,
            batches = stats.batches,
            children_applied = stats.children_applied,
            children_pruned = stats.children_pruned,
            stale_runs_pruned = stats.stale_runs_pruned,
            "dispatched"
        );
        Ok(Outcome::Dispatched(stats))
    }

    /// Write the batch and slot payloads into the group's dispatch config
    /// record, preserving the discovery-owned keys.
    async fn apply_dispatch_config(
        &self,
        group: &WorkGroup,
        owner: &OwnerRef,
        repos: &[String],
        batches: &[Batch],
    ) -> Result<(), DispatchError> {
        let batches_json = serde_json::to_string(&batch::batch_entries(batches))
            .map_err(|e| DispatchError::Store(e.into()))?;
        let slots_json = serde_json::to_string(&batch::slot_entries(repos))
            .map_err(|e| DispatchError::Store(e.into()))?;

        let key = ObjectKey::new(group.meta.namespace.clone(), group.dispatch_config_name());
        let group_name = group.meta.name.clone();
        apply::<ConfigRecord, _>(self.store.as_ref(), &key, Some(owner), |record| {
            record
                .meta
                .labels
                .insert(LABEL_WORK_GROUP.to_string(), group_name);
            record.data.insert(KEY_BATCHES.to_string(), batches_json);
            record.data.insert(KEY_SLOTS.to_string(), slots_json);
        })
        .await?;
        Ok(())
    }

    /// Apply the single execution unit for a manual override.
    async fn apply_manual_job(
        &self,
        group: &WorkGroup,
        owner: &OwnerRef,
        op: Operation,
    ) -> Result<ApplyResult, DispatchError> {
        let key = ObjectKey::new(group.meta.namespace.clone(), group.manual_job_name());
        let group_name = group.meta.name.clone();
        let config_record = group.dispatch_config_name();
        let result = apply::<Job, _>(self.store.as_ref(), &key, Some(owner), |job| {
            job.meta
                .labels
                .insert(LABEL_WORK_GROUP.to_string(), group_name);
            job.spec.operation = op;
            job.spec.completions = Some(1);
            job.spec.parallelism = 1;
            job.spec.completion_mode = CompletionMode::NonIndexed;
            job.spec.config_record = Some(config_record);
        })
        .await?;
        Ok(result)
    }

    /// Apply the periodic indexed execution unit.
    async fn apply_periodic_job(
        &self,
        group: &WorkGroup,
        owner: &OwnerRef,
        completions: i32,
    ) -> Result<ApplyResult, DispatchError> {
        let key = ObjectKey::new(group.meta.namespace.clone(), group.periodic_job_name());
        let group_name = group.meta.name.clone();
        let config_record = group.dispatch_config_name();
        let parallelism = group.spec.parallelism.max(1).min(completions);
        let result = apply::<Job, _>(self.store.as_ref(), &key, Some(owner), |job| {
            job.meta
                .labels
                .insert(LABEL_WORK_GROUP.to_string(), group_name);
            job.spec.operation = Operation::Renovate;
            job.spec.completions = Some(completions);
            job.spec.parallelism = parallelism;
            job.spec.completion_mode = CompletionMode::Indexed;
            job.spec.config_record = Some(config_record);
        })
        .await?;
        Ok(result)
    }

    /// Delete still-pending runs owned by the periodic execution unit.
    async fn prune_pending_runs(&self, group: &WorkGroup) -> Result<usize, DispatchError> {
        let store = self.store.as_ref();
        let job_owner = OwnerRef::new(
            Kind::Job,
            group.meta.namespace.clone(),
            group.periodic_job_name(),
        );

        let runs = store
            .list(Kind::Run, &group.meta.namespace, &ListFilter::default())
            .await?;

        let mut pruned = 0;
        for raw in runs {
            if !raw.meta.is_owned_by(&job_owner) {
                continue;
            }
            let run: Run = raw.decode().map_err(DispatchError::Store)?;
            if run.status.phase == RunPhase::Pending {
                debug!(run = %raw.key(), "pruning stale pending run");
                store.delete(Kind::Run, &raw.key()).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Persist the last-schedule timestamp and clear the override in one
    /// update. A failure here is retryable by the caller; the dispatch
    /// itself already happened. A group deleted while the pass ran has
    /// nothing left to record.
    async fn record_result(&self, raw: RawObject, now: DateTime<Utc>) -> Result<(), DispatchError> {
        let mut group: WorkGroup = raw.decode().map_err(DispatchError::Store)?;
        group.status.last_schedule_time = Some(now);
        group.meta.annotations.remove(ANNOTATION_DISPATCH_OPERATION);

        let encoded = RawObject::encode(&group).map_err(DispatchError::Store)?;
        match self.store.update(encoded).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("work group deleted during the pass, nothing to record");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use depfleet_store::{MemoryStore, ObjectMeta};

    use super::*;

    #[tokio::test]
    async fn missing_group_is_a_skip_not_an_error() {
        let orchestrator = DispatchOrchestrator::new(Arc::new(MemoryStore::new()));
        let outcome = orchestrator
            .run_pass(&ObjectKey::new("fleet", "absent"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NotFound));
    }

    #[tokio::test]
    async fn recording_tolerates_a_group_deleted_mid_pass() {
        let orchestrator = DispatchOrchestrator::new(Arc::new(MemoryStore::new()));
        let group = WorkGroup {
            meta: ObjectMeta::new(&ObjectKey::new("fleet", "nightly")),
            ..WorkGroup::default()
        };
        let raw = RawObject::encode(&group).unwrap();
        orchestrator.record_result(raw, Utc::now()).await.unwrap();
    }
}
