//! Web error type and its JSON rendering.
//!
//! Error bodies use the same envelope as successes with `data: null` and an
//! added machine-readable `error` code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::StoreError;
use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("authentication required")]
    Unauthorized,

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    InvalidTransition { message: String },

    #[error("{message}")]
    InvalidState { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } | Self::InvalidTransition { .. } | Self::InvalidState { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Conflict { .. } => "CONFLICT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => Self::not_found(err.to_string()),
            ServiceError::InvalidTransition { .. } => Self::InvalidTransition {
                message: err.to_string(),
            },
            ServiceError::InvalidState { .. } => Self::InvalidState {
                message: err.to_string(),
            },
            ServiceError::Conflict(message) | ServiceError::AlreadyExists(message) => {
                Self::Conflict { message }
            }
            ServiceError::Validation(message) => Self::BadRequest { message },
            ServiceError::Storage(source) => source.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::not_found(err.to_string()),
            other => {
                error!(error = %other, "Storage operation failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "code": status.as_u16(),
            "error": self.error_code(),
            "message": self.to_string(),
            "data": null,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{TestTaskStatus, WorkflowState};

    #[test]
    fn test_service_error_mapping() {
        let err: ApiError = ServiceError::InvalidTransition {
            from: WorkflowState::Testing,
            to: WorkflowState::Completed,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(
            err.to_string(),
            "cannot move workflow from \"Testing\" to \"Completed\""
        );

        let err: ApiError = ServiceError::InvalidState {
            task_id: 3,
            status: TestTaskStatus::Pending,
            operation: "complete",
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_STATE");

        let err: ApiError = ServiceError::not_found("workflow", 9).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "workflow 9 not found");

        let err: ApiError = ServiceError::AlreadyExists("taken".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_failures_hide_details() {
        let err: ApiError =
            ServiceError::Storage(StoreError::Fixture("disk on fire".to_string())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal server error");
    }
}
