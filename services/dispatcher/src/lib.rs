//! depfleet dispatcher
//!
//! The dispatch core of the depfleet operator: turns a declarative "run
//! dependency-update jobs against a fleet of repositories" intent into a
//! bounded set of concurrently-safe batch executions.
//!
//! Components, leaf-first:
//!
//! - [`batch`]: partitions the discovered repository list into indexed
//!   work units.
//! - [`schedule`]: decides whether a work group is due, combining the
//!   periodic cron schedule with one-shot manual overrides.
//! - [`guard`]: best-effort mutual exclusion against unfinished work.
//! - [`apply`]: the generic idempotent create-or-update-or-no-op primitive.
//! - [`sets`]: converges owned child objects onto the discovered set.
//! - [`discovery`]: reads the discovered repository list from the
//!   collaborator-owned config record.
//! - [`orchestrator`]: composes the above into one pass per work group.
//! - [`worker`]: the periodic background loop driving passes.
//!
//! Dispatch is at-least-once: the guard is a poll-then-act check, not a
//! lock, and overlapping passes for one group are prevented only by the
//! external controller's single-flight invocation.

pub mod apply;
pub mod batch;
pub mod config;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod resources;
pub mod schedule;
pub mod sets;
pub mod worker;

pub use apply::{apply, ApplyError, ApplyResult};
pub use error::{DispatchError, PartialFailure};
pub use orchestrator::{DispatchOrchestrator, DispatchStats, Outcome, SkipReason};
pub use worker::DispatchWorker;
