/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// Workflow outcomes keep their machine reason codes on the wire, so a
/// client can distinguish a plain denial (`region_mismatch`) from a stale
/// one (`stale_class_filled`) without parsing the human message.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regatta_workflow::{ChannelError, WorkflowError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// A workflow intent did not produce an effect; status depends on why
    Workflow(WorkflowError),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine reason code (e.g. "region_mismatch", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Workflow(err) => write!(f, "Workflow error: {}", err),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Maps a workflow error to the HTTP status of its failure class
///
/// Plain denials and unknown actions are unprocessable requests; stale
/// denials are conflicts; partial delivery and store failures are server
/// faults; channel failures mean the notification backend is down.
fn workflow_status(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::ValidationFailed { .. } | WorkflowError::UnhandledActionType { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::StaleState { .. } => StatusCode::CONFLICT,
        WorkflowError::PartialNotificationFailure { .. } | WorkflowError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        WorkflowError::Channel(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Workflow(err) => {
                let status = workflow_status(&err);
                if status.is_server_error() {
                    tracing::error!("Workflow error: {}", err);
                }
                (status, err.reason_code(), err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

/// Convert channel errors from direct inbox operations to API errors
impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::DeliveryFailed(msg) => ApiError::ServiceUnavailable(msg),
            ChannelError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regatta_workflow::DenyReason;

    #[test]
    fn test_error_display() {
        let err = ApiError::NotFound("Notification missing".to_string());
        assert_eq!(err.to_string(), "Not found: Notification missing");
    }

    #[test]
    fn test_workflow_status_mapping() {
        let denied = WorkflowError::ValidationFailed {
            reason: DenyReason::RegionMismatch,
        };
        assert_eq!(workflow_status(&denied), StatusCode::UNPROCESSABLE_ENTITY);

        let stale = WorkflowError::StaleState {
            reason: DenyReason::StaleClassFilled,
        };
        assert_eq!(workflow_status(&stale), StatusCode::CONFLICT);

        let missing = WorkflowError::NotFound {
            what: "notification",
            id: uuid::Uuid::new_v4(),
        };
        assert_eq!(workflow_status(&missing), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_denied_response_carries_reason_code() {
        let err = ApiError::Workflow(WorkflowError::ValidationFailed {
            reason: DenyReason::RegionMismatch,
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "region_mismatch");
    }
}
