//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ProgressionError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found
    NotFound(String),
    /// Validation error
    ValidationError(String),
    /// Write conflicts with existing state
    Conflict(String),
    /// The person already has a step in progress
    AlreadyInProgress(String),
    /// Transition precondition does not hold
    PreconditionFailed(String),
    /// No step in progress to complete
    NoCurrentStep(String),
    /// Missing or wrong bearer token
    Unauthorized,
    /// Upstream failure
    BadGateway(String),
    /// Internal server error
    InternalError(String),
}

/// Error response body
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::AlreadyInProgress(msg) => {
                (StatusCode::CONFLICT, "already_in_progress", msg)
            }
            ApiError::PreconditionFailed(msg) => {
                (StatusCode::BAD_REQUEST, "precondition_failed", msg)
            }
            ApiError::NoCurrentStep(msg) => (StatusCode::BAD_REQUEST, "no_current_step", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid bearer token".to_string(),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<ProgressionError> for ApiError {
    fn from(err: ProgressionError) -> Self {
        match err {
            ProgressionError::Validation(problems) => ApiError::ValidationError(problems.join("; ")),
            ProgressionError::Import(e) => ApiError::ValidationError(e.to_string()),
            ProgressionError::Precondition(msg) => ApiError::PreconditionFailed(msg),
            ProgressionError::NoCurrentStep(msg) => ApiError::NoCurrentStep(msg),
            e @ ProgressionError::ConfirmationRequired { .. } => {
                ApiError::ValidationError(e.to_string())
            }
            ProgressionError::NotFound(msg) => ApiError::NotFound(msg),
            ProgressionError::Conflict(msg) => ApiError::Conflict(msg),
            ProgressionError::AlreadyInProgress(msg) => ApiError::AlreadyInProgress(msg),
            ProgressionError::Auth => ApiError::Unauthorized,
            e @ ProgressionError::Transport { .. } => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InternalError(format!("JSON error: {}", err))
    }
}
