//! Requester-side API: queue a browser action and wait for its result.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::errors::RelayError;
use crate::operation::{Action, OperationDescriptor, OperationOptions};
use crate::queue::OperationQueue;

pub const DEFAULT_CONTROLLER_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra time granted on top of an in-page wait for polling and submission.
pub const IN_PAGE_WAIT_MARGIN: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BrowserController {
    queue: Arc<OperationQueue>,
    timeout: Duration,
}

impl BrowserController {
    pub fn new(queue: Arc<OperationQueue>) -> Self {
        Self {
            queue,
            timeout: DEFAULT_CONTROLLER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queues `descriptor` and returns whatever the executor submitted.
    pub async fn run_raw(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<serde_json::Value, RelayError> {
        self.run_raw_within(descriptor, self.timeout).await
    }

    #[instrument(skip(self, descriptor), fields(action = %descriptor.action))]
    async fn run_raw_within(
        &self,
        descriptor: OperationDescriptor,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let op = self.queue.enqueue(descriptor).await?;
        let value = self.queue.wait_for_result(&op.id, timeout).await?;
        self.queue.take_result(&op.id).await;
        debug!(operation_id = %op.id, "Operation completed");
        Ok(value)
    }

    /// Like [`run_raw`](Self::run_raw) but turns `{ success: false }` into an error.
    pub async fn run(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<serde_json::Value, RelayError> {
        self.run_within(descriptor, self.timeout).await
    }

    async fn run_within(
        &self,
        descriptor: OperationDescriptor,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let value = self.run_raw_within(descriptor, timeout).await?;
        if value.get("success") == Some(&serde_json::Value::Bool(false)) {
            let msg = value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("browser operation returned failure");
            return Err(RelayError::OperationFailed(msg.to_string()));
        }
        Ok(value)
    }

    pub async fn click(&self, selector: &str) -> Result<serde_json::Value, RelayError> {
        self.run(OperationDescriptor::new(Action::Click).with_selector(selector))
            .await
    }

    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<serde_json::Value, RelayError> {
        self.run(
            OperationDescriptor::new(Action::Type)
                .with_selector(selector)
                .with_text(text),
        )
        .await
    }

    pub async fn scroll(
        &self,
        direction: &str,
        amount: Option<i64>,
    ) -> Result<serde_json::Value, RelayError> {
        let mut descriptor = OperationDescriptor::new(Action::Scroll).with_direction(direction);
        if let Some(amount) = amount {
            descriptor = descriptor.with_options(OperationOptions {
                amount: Some(amount),
                ..Default::default()
            });
        }
        self.run(descriptor).await
    }

    pub async fn navigate(&self, url: &str) -> Result<serde_json::Value, RelayError> {
        self.run(OperationDescriptor::new(Action::Navigate).with_url(url))
            .await
    }

    /// Waits in the page for up to `timeout`. The controller itself waits at
    /// least that long plus [`IN_PAGE_WAIT_MARGIN`].
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let within = self.timeout.max(timeout.saturating_add(IN_PAGE_WAIT_MARGIN));
        self.run_within(
            OperationDescriptor::new(Action::WaitForElement)
                .with_selector(selector)
                .with_options(OperationOptions {
                    timeout: Some(timeout.as_millis() as u64),
                    ..Default::default()
                }),
            within,
        )
        .await
    }

    pub async fn execute_script(&self, code: &str) -> Result<serde_json::Value, RelayError> {
        self.run(OperationDescriptor::new(Action::ExecuteScript).with_text(code))
            .await
    }

    pub async fn get_page_data(&self) -> Result<serde_json::Value, RelayError> {
        self.run(OperationDescriptor::new(Action::GetPageData)).await
    }

    pub async fn screenshot(&self) -> Result<serde_json::Value, RelayError> {
        self.run(OperationDescriptor::new(Action::Screenshot)).await
    }
}
