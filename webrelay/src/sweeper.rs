use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::MIN_TICK;
use crate::queue::OperationQueue;

/// Background task that prunes expired operations and results.
///
/// The task is aborted when the handle is dropped.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(queue: Arc<OperationQueue>) -> Self {
        let period = queue.config().cleanup_interval.max(MIN_TICK);
        info!(
            interval_ms = period.as_millis() as u64,
            max_age_ms = queue.config().max_age.as_millis() as u64,
            "Starting expiry sweeper"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = queue.prune_expired().await;
                debug!(
                    pending = report.pending,
                    results = report.results,
                    "Sweep finished"
                );
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
