//! Typed resources the dispatch core reads and writes.
//!
//! Naming is deterministic per work group so that repeated reconciliation
//! is idempotent: the dispatch config record is `<group>-dispatch`, the
//! periodic execution unit `<group>-renovate`, and the manual unit
//! `<group>-manual`. Every child carries the work-group label and an owner
//! reference back to its group.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use depfleet_store::{Kind, ObjectMeta, OwnerRef, Resource};
use serde::{Deserialize, Serialize};

/// Label stamped on every child object, valued with the group name.
pub const LABEL_WORK_GROUP: &str = "depfleet.dev/work-group";

/// Annotation on a work group requesting an immediate one-shot dispatch.
pub const ANNOTATION_DISPATCH_OPERATION: &str = "depfleet.dev/dispatch-operation";

/// Annotation on owned children carrying the raw discovered identifier.
pub const ANNOTATION_SOURCE_ID: &str = "depfleet.dev/source-id";

/// Config record key the discovery collaborator writes: a JSON array of
/// raw repository identifier strings.
pub const KEY_REPOSITORIES: &str = "repositories";

/// Config record key holding one JSON entry per batch.
pub const KEY_BATCHES: &str = "batches";

/// Config record key holding one JSON entry per indexed execution slot.
pub const KEY_SLOTS: &str = "slots";

/// Recognized one-shot operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Discover,
    #[default]
    Renovate,
}

impl Operation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discover" => Some(Operation::Discover),
            "renovate" => Some(Operation::Renovate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Discover => "discover",
            Operation::Renovate => "renovate",
        }
    }
}

/// How the discovered repository list is split into execution units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStrategy {
    /// One batch containing every repository.
    #[default]
    None,
    /// Consecutive fixed-size chunks.
    Batch,
}

fn default_parallelism() -> i32 {
    1
}

/// Desired behavior of a work group, declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroupSpec {
    /// Cron expression (with seconds field) for periodic dispatch.
    pub schedule: String,

    /// When true, nothing is ever dispatched.
    #[serde(default)]
    pub suspend: bool,

    /// Explicit batch size; when unset or non-positive the size is derived
    /// from the repository count and parallelism.
    #[serde(default)]
    pub batch_size: Option<i32>,

    /// Desired number of parallel workers.
    #[serde(default = "default_parallelism")]
    pub parallelism: i32,

    #[serde(default)]
    pub strategy: BatchStrategy,

    /// Discovery filter criteria, passed through to the discovery
    /// collaborator.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for WorkGroupSpec {
    fn default() -> Self {
        Self {
            schedule: String::new(),
            suspend: false,
            batch_size: None,
            parallelism: default_parallelism(),
            strategy: BatchStrategy::default(),
            filter: None,
        }
    }
}

/// Dispatch state the orchestrator records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroupStatus {
    #[serde(default)]
    pub last_schedule_time: Option<DateTime<Utc>>,
}

/// A user-declared intent to run work on a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkGroup {
    pub meta: ObjectMeta,
    pub spec: WorkGroupSpec,
    #[serde(default)]
    pub status: WorkGroupStatus,
}

impl Resource for WorkGroup {
    const KIND: Kind = Kind::WorkGroup;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl WorkGroup {
    /// Recognized one-shot operation requested via annotation, if any.
    pub fn requested_operation(&self) -> Option<Operation> {
        self.meta
            .annotations
            .get(ANNOTATION_DISPATCH_OPERATION)
            .and_then(|v| Operation::parse(v))
    }

    /// Owner reference children of this group carry.
    pub fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(
            Kind::WorkGroup,
            self.meta.namespace.clone(),
            self.meta.name.clone(),
        )
    }

    /// Name of the config record holding discovered repositories and the
    /// dispatch payloads.
    pub fn dispatch_config_name(&self) -> String {
        format!("{}-dispatch", self.meta.name)
    }

    /// Name of the periodic indexed execution unit.
    pub fn periodic_job_name(&self) -> String {
        format!("{}-renovate", self.meta.name)
    }

    /// Name of the one-shot execution unit for manual overrides.
    pub fn manual_job_name(&self) -> String {
        format!("{}-manual", self.meta.name)
    }
}

/// One discovered repository, mirrored as an owned child object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: RepositorySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    /// Raw identifier as reported by discovery.
    #[serde(default)]
    pub source_id: String,
}

impl Resource for Repository {
    const KIND: Kind = Kind::Repository;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// String-keyed configuration data shared with the collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Resource for ConfigRecord {
    const KIND: Kind = Kind::ConfigRecord;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Completion model of an execution unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    #[default]
    NonIndexed,
    /// Each worker is assigned a distinct integer slot correlated to a
    /// batch index.
    Indexed,
}

/// Desired shape of an execution unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub operation: Operation,

    /// Declared number of completions; unset means "not yet determined".
    #[serde(default)]
    pub completions: Option<i32>,

    #[serde(default = "default_parallelism")]
    pub parallelism: i32,

    #[serde(default)]
    pub completion_mode: CompletionMode,

    /// Name of the config record workers read their batch payload from.
    #[serde(default)]
    pub config_record: Option<String>,
}

/// Counters the external runtime reports on an execution unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub active: i32,
    #[serde(default)]
    pub succeeded: i32,
    #[serde(default)]
    pub failed: i32,
}

/// An execution unit dispatched for a work group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub meta: ObjectMeta,
    pub spec: JobSpec,
    #[serde(default)]
    pub status: JobStatus,
}

impl Resource for Job {
    const KIND: Kind = Kind::Job;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Job {
    /// Whether this unit still counts as unfinished work.
    ///
    /// A unit with workers running is active. A unit with no declared
    /// completions and no succeeded/failed counts has been created but not
    /// started, and deliberately counts as active to close the race between
    /// unit creation and worker startup. A unit with no running workers and
    /// at least one terminal count is finished.
    pub fn is_active(&self) -> bool {
        if self.status.active > 0 {
            return true;
        }
        self.spec.completions.unwrap_or(0) <= 0
            && self.status.succeeded == 0
            && self.status.failed == 0
    }
}

/// Phase of a run started under a job by the external runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    #[serde(default)]
    pub phase: RunPhase,
}

/// A unit of work the external runtime starts under a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub status: RunStatus,
}

impl Resource for Run {
    const KIND: Kind = Kind::Run;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
