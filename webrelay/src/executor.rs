//! Polling executor: fetch pending operations, run their scripts in the
//! browser, submit the results.
//!
//! One tick processes the pending list strictly in order, one operation at a
//! time. Ticks never overlap; a slow tick delays the next one. Failures are
//! converted to `{ success: false, error }` results and submitted like any
//! other result. Nothing is retried.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::client::RelayClient;
use crate::config::{ExecutorConfig, MIN_TICK};
use crate::errors::RelayError;
use crate::evaluator::ScriptEvaluator;
use crate::operation::{failure_result, Action, OperationId, PendingOperation};

/// Counters for one polling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Already executed by this process (e.g. their submission was lost).
    pub skipped: usize,
    pub submit_failures: usize,
}

pub struct PollingExecutor<C, E> {
    client: C,
    evaluator: E,
    config: ExecutorConfig,
    executed: HashMap<OperationId, Instant>,
}

impl<C: RelayClient, E: ScriptEvaluator> PollingExecutor<C, E> {
    pub fn new(client: C, evaluator: E, mut config: ExecutorConfig) -> Self {
        config.poll_interval = config.poll_interval.max(MIN_TICK);
        Self {
            client,
            evaluator,
            config,
            executed: HashMap::new(),
        }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Runs one polling tick.
    pub async fn tick(&mut self) -> Result<TickReport, RelayError> {
        self.forget_old_executions();

        let pending = self.client.fetch_pending().await?;
        let mut report = TickReport::default();
        if pending.is_empty() {
            return Ok(report);
        }
        debug!(count = pending.len(), "Fetched pending operations");

        for op in pending {
            if self.executed.contains_key(&op.id) {
                report.skipped += 1;
                continue;
            }

            let result = self.execute(&op).await;
            let succeeded = result.get("success") == Some(&serde_json::Value::Bool(true));
            report.executed += 1;
            if succeeded {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            self.executed.insert(op.id.clone(), Instant::now());

            if let Err(e) = self.client.submit_result(&op.id, &result).await {
                // Dropped: the next tick will not run it again.
                warn!(operation_id = %op.id, "Failed to submit result: {}", e);
                report.submit_failures += 1;
            }
        }

        info!(
            executed = report.executed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Tick finished"
        );
        Ok(report)
    }

    /// Executes one operation and always yields a result payload.
    pub async fn execute(&self, op: &PendingOperation) -> serde_json::Value {
        let outcome = self.try_execute(op).await;
        match outcome {
            Ok(value) => value,
            Err(e) => {
                warn!(operation_id = %op.id, action = %op.operation.action, "Operation failed: {}", e);
                failure_result(e)
            }
        }
    }

    async fn try_execute(&self, op: &PendingOperation) -> Result<serde_json::Value, RelayError> {
        let action = op.operation.action()?;
        info!(operation_id = %op.id, action = %action, "Executing operation");

        if action == Action::Screenshot {
            return self
                .evaluator
                .capture_screenshot(self.config.eval_timeout)
                .await;
        }

        let script = self.client.fetch_script(&op.operation).await?;
        self.evaluator
            .evaluate(&script, self.config.eval_timeout)
            .await
    }

    fn forget_old_executions(&mut self) {
        let ttl = self.config.executed_memory;
        self.executed.retain(|_, at| at.elapsed() < ttl);
    }

    /// Polls until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Polling executor started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                error!("Polling tick failed: {}", e);
            }
        }
        info!("Polling executor stopped");
    }
}

/// Convenience for running an executor with a fresh shutdown channel.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
