//! Schedule evaluation: decides whether a work group is due for dispatch.
//!
//! Precedence: suspend beats everything; a recognized override annotation
//! beats the periodic schedule; a group that has never run is due
//! immediately; otherwise the next occurrence strictly after the recorded
//! last run decides.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use thiserror::Error;

use crate::resources::{Operation, WorkGroup};

/// Schedule evaluation errors; configuration errors, never auto-retried.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression '{expression}': {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: cron::error::Error,
    },
}

/// Why a group is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueReason {
    /// No recorded last run.
    FirstRun,
    /// The periodic schedule fired.
    Periodic,
    /// A one-shot override was requested; the caller must clear it after
    /// dispatch.
    Override(Operation),
}

/// Outcome of evaluating a work group's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NotDue,
    Due(DueReason),
}

impl Decision {
    pub fn is_due(&self) -> bool {
        matches!(self, Decision::Due(_))
    }
}

/// Evaluate whether `group` should dispatch at `now`.
pub fn evaluate(group: &WorkGroup, now: DateTime<Utc>) -> Result<Decision, ScheduleError> {
    if group.spec.suspend {
        return Ok(Decision::NotDue);
    }

    if let Some(op) = group.requested_operation() {
        return Ok(Decision::Due(DueReason::Override(op)));
    }

    let schedule = Schedule::from_str(&group.spec.schedule).map_err(|source| {
        ScheduleError::InvalidExpression {
            expression: group.spec.schedule.clone(),
            source,
        }
    })?;

    let Some(last) = group.status.last_schedule_time else {
        return Ok(Decision::Due(DueReason::FirstRun));
    };

    // Next occurrence strictly after the recorded last run.
    match schedule.after(&last).next() {
        Some(next) if now >= next => Ok(Decision::Due(DueReason::Periodic)),
        _ => Ok(Decision::NotDue),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::resources::ANNOTATION_DISPATCH_OPERATION;

    // Hourly at minute 0 (seconds-field cron format).
    const HOURLY: &str = "0 0 * * * *";

    fn group(schedule: &str) -> WorkGroup {
        let mut g = WorkGroup::default();
        g.spec.schedule = schedule.to_string();
        g
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn suspend_forces_not_due_even_with_override() {
        let mut g = group(HOURLY);
        g.spec.suspend = true;
        g.meta
            .annotations
            .insert(ANNOTATION_DISPATCH_OPERATION.into(), "renovate".into());
        assert_eq!(evaluate(&g, at(12, 0)).unwrap(), Decision::NotDue);
    }

    #[test]
    fn override_takes_precedence_over_schedule() {
        // Schedule says not due; the override still fires.
        let mut g = group(HOURLY);
        g.status.last_schedule_time = Some(at(12, 0));
        g.meta
            .annotations
            .insert(ANNOTATION_DISPATCH_OPERATION.into(), "discover".into());
        assert_eq!(
            evaluate(&g, at(12, 5)).unwrap(),
            Decision::Due(DueReason::Override(Operation::Discover))
        );
    }

    #[test]
    fn first_run_is_due_immediately() {
        let g = group(HOURLY);
        assert_eq!(
            evaluate(&g, at(12, 30)).unwrap(),
            Decision::Due(DueReason::FirstRun)
        );
    }

    #[test]
    fn periodic_due_only_at_or_after_next_occurrence() {
        let mut g = group(HOURLY);
        g.status.last_schedule_time = Some(at(12, 0));

        assert_eq!(evaluate(&g, at(12, 30)).unwrap(), Decision::NotDue);
        assert_eq!(
            evaluate(&g, at(13, 0)).unwrap(),
            Decision::Due(DueReason::Periodic)
        );
        assert_eq!(
            evaluate(&g, at(14, 45)).unwrap(),
            Decision::Due(DueReason::Periodic)
        );
    }

    #[test]
    fn unrecognized_override_falls_through_to_schedule() {
        let mut g = group(HOURLY);
        g.status.last_schedule_time = Some(at(12, 0));
        g.meta
            .annotations
            .insert(ANNOTATION_DISPATCH_OPERATION.into(), "bogus".into());
        assert_eq!(evaluate(&g, at(12, 30)).unwrap(), Decision::NotDue);
    }

    #[test]
    fn malformed_expression_is_a_config_error() {
        let g = group("not a cron line");
        let err = evaluate(&g, at(12, 0)).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidExpression { .. }));
    }
}
