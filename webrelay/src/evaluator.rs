use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RelayError;

/// Execution context that can run generated scripts in a page.
///
/// Implementations await promise results before returning.
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError>;

    /// Captures the visible page. Not every context can do this.
    async fn capture_screenshot(
        &self,
        _timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        Err(RelayError::UnsupportedOperation(
            "screenshot is not available in this execution context".into(),
        ))
    }
}
