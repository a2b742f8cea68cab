//! Executor-side access to the relay: over HTTP, or directly in-process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::RelayError;
use crate::operation::{OperationDescriptor, OperationId, PendingOperation};
use crate::protocol::{
    MessageResponse, PendingResponse, ScriptResponse, SubmitResultRequest, ACTION_GET_PENDING,
    ACTION_SUBMIT_RESULT,
};
use crate::queue::OperationQueue;
use crate::script;

/// The three calls the polling executor makes against the relay.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<PendingOperation>, RelayError>;

    async fn fetch_script(&self, descriptor: &OperationDescriptor) -> Result<String, RelayError>;

    async fn submit_result(
        &self,
        id: &OperationId,
        result: &serde_json::Value,
    ) -> Result<(), RelayError>;
}

/// Talks to a relay server's `browser-control-real` endpoint.
#[derive(Clone)]
pub struct HttpRelayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRelayClient {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn fetch_pending(&self) -> Result<Vec<PendingOperation>, RelayError> {
        let body: PendingResponse = self
            .http
            .get(&self.endpoint)
            .query(&[("action", ACTION_GET_PENDING)])
            .send()
            .await?
            .json()
            .await?;
        if !body.success {
            return Err(RelayError::Rejected(
                body.error.unwrap_or_else(|| "get_pending failed".into()),
            ));
        }
        Ok(body.data)
    }

    async fn fetch_script(&self, descriptor: &OperationDescriptor) -> Result<String, RelayError> {
        // Failure responses carry a JSON body too, so the status is not checked.
        let body: ScriptResponse = self
            .http
            .post(&self.endpoint)
            .json(descriptor)
            .send()
            .await?
            .json()
            .await?;
        match (body.success, body.script) {
            (true, Some(script)) => Ok(script),
            _ => Err(RelayError::Rejected(
                body.error.unwrap_or_else(|| "script generation failed".into()),
            )),
        }
    }

    async fn submit_result(
        &self,
        id: &OperationId,
        result: &serde_json::Value,
    ) -> Result<(), RelayError> {
        // Sent as a JSON body: screenshots and page dumps overflow a query string.
        let request = SubmitResultRequest {
            operation_id: id.clone(),
            result: result.clone(),
        };
        let body: MessageResponse = self
            .http
            .post(&self.endpoint)
            .query(&[("action", ACTION_SUBMIT_RESULT)])
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        if !body.success {
            return Err(RelayError::Rejected(
                body.error.unwrap_or_else(|| "submit_result failed".into()),
            ));
        }
        debug!(operation_id = %id, "Result delivered to relay");
        Ok(())
    }
}

/// Executes against a queue living in the same process.
#[derive(Clone)]
pub struct LocalRelayClient {
    queue: Arc<OperationQueue>,
}

impl LocalRelayClient {
    pub fn new(queue: Arc<OperationQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl RelayClient for LocalRelayClient {
    async fn fetch_pending(&self) -> Result<Vec<PendingOperation>, RelayError> {
        Ok(self.queue.pending().await)
    }

    async fn fetch_script(&self, descriptor: &OperationDescriptor) -> Result<String, RelayError> {
        script::generate(descriptor)
    }

    async fn submit_result(
        &self,
        id: &OperationId,
        result: &serde_json::Value,
    ) -> Result<(), RelayError> {
        self.queue.submit_result(id, result.clone()).await;
        Ok(())
    }
}
