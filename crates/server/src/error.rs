// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leakwatch_core::Phase;
use leakwatch_store::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::commands::CommandError;

/// Structured JSON error response for API errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The job's phase at evaluation time, present on command
    /// rejections so the caller can reconcile its stale view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            phase: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            phase: None,
        }
    }

    pub fn with_phase(error: impl Into<String>, details: impl Into<String>, phase: Phase) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            phase: Some(phase),
        }
    }
}

/// API error types that map to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Collection source unavailable: {0}")]
    SourceUnavailable(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::SourceUnavailable(msg) => {
                tracing::warn!(message = %msg, "Collection source unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("Collection source unavailable", msg.clone()),
                )
            }
            ApiError::Command(cmd_err) => match cmd_err {
                CommandError::NotFound(id) => {
                    tracing::warn!(job_id = %id, "Command for unknown job");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                    )
                }
                CommandError::NotPausable { phase }
                | CommandError::NotPaused { phase }
                | CommandError::NotCancellable { phase } => {
                    tracing::warn!(%phase, rejection = %cmd_err, "Command rejected");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_phase("Conflict", cmd_err.to_string(), *phase),
                    )
                }
                CommandError::Store(store_err) => {
                    tracing::error!(error = %store_err, "Store error during command");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::with_details("Store error", store_err.to_string()),
                    )
                }
            },
            ApiError::Store(store_err) => {
                tracing::error!(error = %store_err, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Store error", store_err.to_string()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_job_not_found_returns_404() {
        let error = ApiError::JobNotFound("abc123".to_string());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Job not found");
        assert!(body.details.unwrap().contains("abc123"));
    }

    #[tokio::test]
    async fn test_command_rejection_returns_409_with_phase() {
        let error = ApiError::Command(CommandError::NotPausable {
            phase: Phase::Parsing,
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Conflict");
        assert_eq!(body.phase, Some(Phase::Parsing));
        assert!(body.details.unwrap().contains("parsing"));
    }

    #[tokio::test]
    async fn test_not_paused_rejection_carries_current_phase() {
        let error = ApiError::Command(CommandError::NotPaused {
            phase: Phase::Cancelling,
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.phase, Some(Phase::Cancelling));
    }

    #[tokio::test]
    async fn test_command_not_found_returns_404() {
        let error = ApiError::Command(CommandError::NotFound("ghost".into()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Job not found");
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let error = ApiError::BadRequest("query must not be empty".into());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.details.unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_source_unavailable_returns_503() {
        let error = ApiError::SourceUnavailable("no intel source configured".into());
        let (status, _body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let error = ApiError::Internal("secret stack trace".to_string());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_error_response_serialization_skips_absent_fields() {
        let json = serde_json::to_string(&ErrorResponse::new("Test error")).unwrap();
        assert!(json.contains("\"error\":\"Test error\""));
        assert!(!json.contains("details"));
        assert!(!json.contains("phase"));

        let json = serde_json::to_string(&ErrorResponse::with_phase(
            "Conflict",
            "not pausable",
            Phase::Upserting,
        ))
        .unwrap();
        assert!(json.contains("\"phase\":\"upserting\""));
    }
}
