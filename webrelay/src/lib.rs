//! Browser-automation operation relay.
//!
//! A requester queues browser actions ([`OperationQueue`], [`BrowserController`]),
//! a [`PollingExecutor`] picks them up once per tick, turns each into an in-page
//! script ([`script::generate`]), runs it through a [`ScriptEvaluator`] such as
//! the WebSocket [`ExtensionBridge`], and submits the result back. Pending
//! operations and results live in memory only and expire after a fixed age
//! ([`Sweeper`]).

pub mod bridge;
pub mod client;
pub mod config;
pub mod controller;
pub mod errors;
pub mod evaluator;
pub mod executor;
pub mod operation;
pub mod protocol;
pub mod queue;
pub mod script;
pub mod sweeper;
#[cfg(test)]
mod tests;

pub use bridge::ExtensionBridge;
pub use client::{HttpRelayClient, LocalRelayClient, RelayClient};
pub use config::{ExecutorConfig, RelayConfig};
pub use controller::BrowserController;
pub use errors::RelayError;
pub use evaluator::ScriptEvaluator;
pub use executor::{PollingExecutor, TickReport};
pub use operation::{
    Action, OperationDescriptor, OperationId, OperationOptions, OperationResult, PendingOperation,
};
pub use queue::{OperationQueue, PruneReport, QueueStats, SubmitOutcome};
pub use sweeper::Sweeper;
