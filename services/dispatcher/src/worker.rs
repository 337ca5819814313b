//! Dispatch background worker.
//!
//! Runs one reconciliation pass per known work group on a periodic
//! interval, until shutdown is signaled. The worker is the event loop; the
//! per-group decision logic lives in [`DispatchOrchestrator`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use depfleet_store::{Kind, ListFilter, ObjectStore};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::orchestrator::{DispatchOrchestrator, Outcome};

/// Worker that periodically reconciles every work group.
pub struct DispatchWorker {
    store: Arc<dyn ObjectStore>,
    orchestrator: DispatchOrchestrator,
    interval: Duration,
}

impl DispatchWorker {
    pub fn new(store: Arc<dyn ObjectStore>, interval: Duration) -> Self {
        Self {
            orchestrator: DispatchOrchestrator::new(store.clone()),
            store,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting dispatch worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_all_groups().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Dispatch worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one pass for every work group in the store.
    async fn run_all_groups(&self) {
        let groups = match self
            .store
            .list(Kind::WorkGroup, "", &ListFilter::default())
            .await
        {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "Failed to list work groups");
                return;
            }
        };
        debug!(group_count = groups.len(), "Found work groups to reconcile");

        for raw in groups {
            let key = raw.key();
            match self.orchestrator.run_pass(&key, Utc::now()).await {
                Ok(Outcome::Dispatched(_)) => {}
                Ok(Outcome::Requeue(delay)) => {
                    // The interval loop revisits every group anyway; the
                    // requested delay only matters to event-driven callers.
                    debug!(group = %key, delay_secs = delay.as_secs(), "requeue requested");
                }
                Ok(Outcome::Skipped(reason)) => {
                    debug!(group = %key, ?reason, "pass skipped");
                }
                Err(e) => {
                    error!(group = %key, error = %e, "Dispatch pass failed");
                }
            }
        }
    }
}
