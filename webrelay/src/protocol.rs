//! JSON bodies exchanged with the relay endpoint.

use serde::{Deserialize, Serialize};

use crate::operation::{OperationId, PendingOperation};

pub const ACTION_GET_PENDING: &str = "get_pending";
pub const ACTION_SUBMIT_RESULT: &str = "submit_result";
pub const ACTION_GET_RESULT: &str = "get_result";

/// Response to `POST` with a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to `GET ?action=get_pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<PendingOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to `GET ?action=submit_result` (and other plain acknowledgements).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to `GET ?action=get_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
}

/// Response to enqueueing an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub success: bool,
    #[serde(rename = "operationId")]
    pub operation_id: OperationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Query string of the relay's `GET` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayQuery {
    pub action: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Body of `POST ?action=submit_result`, used for results too large for a
/// query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultRequest {
    #[serde(rename = "operationId")]
    pub operation_id: OperationId,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Parses the URL-decoded `result` parameter. Text that is not JSON is kept as
/// a JSON string.
pub fn parse_submitted_result(raw: Option<&str>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Null,
        Some(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
    }
}
