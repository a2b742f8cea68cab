use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use webrelay::protocol::{
    parse_submitted_result, EnqueueResponse, MessageResponse, PendingResponse, RelayQuery,
    ResultResponse, ScriptResponse, SubmitResultRequest, ACTION_GET_PENDING, ACTION_GET_RESULT,
    ACTION_SUBMIT_RESULT,
};
use webrelay::{script, OperationDescriptor, OperationId, RelayError};

use crate::AppState;

// ============================================================================
// Error Handling
// ============================================================================

/// Every failure leaves the relay as `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({
                "success": false,
                "error": self.message
            })),
        )
            .into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("invalid operation body: {}", rejection.body_text()))
    }
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.queue.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pending": stats.pending,
        "results": stats.results,
    }))
}

// ============================================================================
// POST: script generation, or result submission with ?action=submit_result
// ============================================================================

pub async fn relay_post(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    match query.action.as_deref() {
        None => {
            let descriptor: OperationDescriptor = serde_json::from_value(body)
                .map_err(|e| ApiError::bad_request(format!("invalid operation body: {e}")))?;
            Ok(generate_script(descriptor)?.into_response())
        }
        Some(ACTION_SUBMIT_RESULT) => {
            let request: SubmitResultRequest = serde_json::from_value(body)
                .map_err(|e| ApiError::bad_request(format!("invalid result body: {e}")))?;
            if request.operation_id.as_str().is_empty() {
                return Err(ApiError::bad_request("missing field `operationId`"));
            }
            Ok(record_result(&state, request.operation_id, request.result)
                .await
                .into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown action for POST: {other}"
        ))),
    }
}

fn generate_script(descriptor: OperationDescriptor) -> Result<Json<ScriptResponse>, ApiError> {
    let script = script::generate(&descriptor).inspect_err(|e| {
        warn!(action = %descriptor.action, "Script generation rejected: {}", e);
    })?;

    Ok(Json(ScriptResponse {
        success: true,
        script: Some(script),
        error: None,
    }))
}

// ============================================================================
// Queue Access (GET ?action=...)
// ============================================================================

pub async fn relay_get(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
) -> Result<Response, ApiError> {
    match query.action.as_deref() {
        Some(ACTION_GET_PENDING) => {
            let data = state.queue.pending().await;
            Ok(Json(PendingResponse {
                success: true,
                data,
                error: None,
            })
            .into_response())
        }
        Some(ACTION_SUBMIT_RESULT) => {
            let id = required_operation_id(&query)?;
            let result = parse_submitted_result(query.result.as_deref());
            Ok(record_result(&state, id, result).await.into_response())
        }
        Some(ACTION_GET_RESULT) => {
            let id = required_operation_id(&query)?;
            let data = state.queue.result(&id).await.map(|r| r.result);
            Ok(Json(ResultResponse {
                success: true,
                data,
            })
            .into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!("unknown action: {other}"))),
        None => Err(ApiError::bad_request("missing query parameter `action`")),
    }
}

async fn record_result(
    state: &AppState,
    id: OperationId,
    result: serde_json::Value,
) -> Json<MessageResponse> {
    let outcome = state.queue.submit_result(&id, result).await;
    let message = if outcome.was_pending {
        format!("Result recorded for {id}")
    } else {
        format!("Result recorded for {id} (operation was not pending)")
    };
    Json(MessageResponse {
        success: true,
        message: Some(message),
        error: None,
    })
}

fn required_operation_id(query: &RelayQuery) -> Result<OperationId, ApiError> {
    query
        .operation_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(OperationId::from)
        .ok_or_else(|| ApiError::bad_request("missing query parameter `operationId`"))
}

// ============================================================================
// Enqueue (POST /operations)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EnqueueQuery {
    pub wait_ms: Option<u64>,
}

pub async fn enqueue_operation(
    State(state): State<AppState>,
    Query(params): Query<EnqueueQuery>,
    body: Result<Json<OperationDescriptor>, JsonRejection>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let Json(descriptor) = body?;
    info!("📥 Enqueue {} operation", descriptor.action);

    let op = state.queue.enqueue(descriptor).await?;

    let Some(wait_ms) = params.wait_ms else {
        return Ok(Json(EnqueueResponse {
            success: true,
            operation_id: op.id,
            result: None,
        }));
    };

    let result = state
        .queue
        .wait_for_result(&op.id, Duration::from_millis(wait_ms))
        .await?;
    state.queue.take_result(&op.id).await;

    Ok(Json(EnqueueResponse {
        success: true,
        operation_id: op.id,
        result: Some(result),
    }))
}
