//! In-memory pending-operation queue and result correlation table.
//!
//! Both collections are keyed by [`OperationId`] and expire after
//! [`RelayConfig::max_age`]. Requesters that want to block on a result register
//! a one-shot waiter which is completed by [`OperationQueue::submit_result`].

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::errors::RelayError;
use crate::operation::{OperationDescriptor, OperationId, OperationResult, PendingOperation};

type Waiters = HashMap<OperationId, Vec<oneshot::Sender<serde_json::Value>>>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingOperation>,
    results: HashMap<OperationId, OperationResult>,
    waiters: Waiters,
}

/// Outcome of [`OperationQueue::submit_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The id was still in the pending list and has been removed.
    pub was_pending: bool,
    /// Number of requesters woken by this result.
    pub notified: usize,
}

/// Counts removed by one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub pending: usize,
    pub results: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.pending == 0 && self.results == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub results: usize,
}

pub struct OperationQueue {
    config: RelayConfig,
    state: Mutex<QueueState>,
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl OperationQueue {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Appends a new operation to the pending list.
    ///
    /// The action must be one of the known actions; the remaining fields are
    /// checked when the script is generated.
    pub async fn enqueue(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<PendingOperation, RelayError> {
        let action = descriptor.action()?;

        let mut state = self.state.lock().await;
        if state.pending.len() >= self.config.max_pending {
            warn!(
                pending = state.pending.len(),
                "Rejecting operation: queue is full"
            );
            return Err(RelayError::QueueFull(state.pending.len()));
        }

        let op = PendingOperation {
            id: OperationId::generate(),
            operation: descriptor,
            timestamp: now_millis(),
        };
        state.pending.push_back(op.clone());
        info!(operation_id = %op.id, action = %action, "Operation queued");
        Ok(op)
    }

    /// Snapshot of the pending list in insertion order.
    pub async fn pending(&self) -> Vec<PendingOperation> {
        self.state.lock().await.pending.iter().cloned().collect()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            pending: state.pending.len(),
            results: state.results.len(),
        }
    }

    /// Records the result of an operation and removes it from the pending list.
    ///
    /// Results for ids that are no longer pending are still recorded.
    pub async fn submit_result(
        &self,
        id: &OperationId,
        result: serde_json::Value,
    ) -> SubmitOutcome {
        let mut state = self.state.lock().await;

        let before = state.pending.len();
        state.pending.retain(|op| &op.id != id);
        let was_pending = state.pending.len() != before;

        let mut notified = 0;
        if let Some(waiters) = state.waiters.remove(id) {
            for tx in waiters {
                if tx.send(result.clone()).is_ok() {
                    notified += 1;
                }
            }
        }

        state.results.insert(
            id.clone(),
            OperationResult {
                operation_id: id.clone(),
                result,
                timestamp: now_millis(),
            },
        );

        if was_pending {
            info!(operation_id = %id, notified, "Result submitted");
        } else {
            warn!(operation_id = %id, "Result submitted for an operation that is not pending");
        }

        SubmitOutcome {
            was_pending,
            notified,
        }
    }

    pub async fn result(&self, id: &OperationId) -> Option<OperationResult> {
        self.state.lock().await.results.get(id).cloned()
    }

    pub async fn take_result(&self, id: &OperationId) -> Option<OperationResult> {
        self.state.lock().await.results.remove(id)
    }

    /// Waits until a result for `id` is submitted.
    ///
    /// Returns immediately when the result is already recorded. Fails with
    /// [`RelayError::NotFound`] when the operation expires while waiting.
    pub async fn wait_for_result(
        &self,
        id: &OperationId,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let rx = {
            let mut state = self.state.lock().await;
            if let Some(done) = state.results.get(id) {
                return Ok(done.result.clone());
            }
            if !state.pending.iter().any(|op| &op.id == id) {
                return Err(RelayError::NotFound(id.to_string()));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.entry(id.clone()).or_default().push(tx);
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_dropped)) => Err(RelayError::NotFound(format!("{id} (expired)"))),
            Err(_elapsed) => {
                debug!(operation_id = %id, "Timed out waiting for result");
                Err(RelayError::Timeout(format!(
                    "no result for {id} within {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Prunes entries older than `max_age` using the current wall clock.
    pub async fn prune_expired(&self) -> PruneReport {
        self.prune_expired_at(now_millis()).await
    }

    /// Prunes entries whose timestamp is older than `now - max_age`.
    pub async fn prune_expired_at(&self, now: i64) -> PruneReport {
        let max_age = i64::try_from(self.config.max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(max_age);

        let mut state = self.state.lock().await;

        let mut expired_ids = Vec::new();
        state.pending.retain(|op| {
            let keep = op.timestamp >= cutoff;
            if !keep {
                expired_ids.push(op.id.clone());
            }
            keep
        });
        // Dropping the senders wakes waiters of expired operations.
        for id in &expired_ids {
            state.waiters.remove(id);
        }
        state.waiters.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });

        let results_before = state.results.len();
        state.results.retain(|_, r| r.timestamp >= cutoff);

        let report = PruneReport {
            pending: expired_ids.len(),
            results: results_before - state.results.len(),
        };
        if !report.is_empty() {
            info!(
                pending = report.pending,
                results = report.results,
                "Pruned expired operations"
            );
        }
        report
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
