// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::store::StoreError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed input shape)
    ValidationFailed(String),

    // 400 Bad Request (answer references a question outside the quiz)
    InvalidQuestion(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (role, ownership or enrollment check failed)
    Forbidden(String),

    // 403 Forbidden (results withheld by quiz settings)
    ResultsNotAvailable(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (wrong lifecycle phase)
    InvalidState(String),

    // 409 Conflict (attempt already submitted; carries the existing attempt id)
    AlreadyCompleted { attempt_id: String },

    // 409 Conflict (e.g., duplicate display order)
    Conflict(String),

    // 422 Unprocessable Entity
    TimeLimitExceeded(String),

    // 422 Unprocessable Entity (grade exceeds max points)
    OutOfRange(String),
}

impl AppError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::InvalidQuestion(_) => "invalid_question",
            AppError::AuthError(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::ResultsNotAvailable(_) => "results_not_available",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::AlreadyCompleted { .. } => "already_completed",
            AppError::Conflict(_) => "conflict",
            AppError::TimeLimitExceeded(_) => "time_limit_exceeded",
            AppError::OutOfRange(_) => "out_of_range",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationFailed(_) | AppError::InvalidQuestion(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::ResultsNotAvailable(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) | AppError::AlreadyCompleted { .. } | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::TimeLimitExceeded(_) | AppError::OutOfRange(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let body = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "error": "Internal Server Error", "kind": kind })
            }
            AppError::AlreadyCompleted { attempt_id } => json!({
                "error": "Quiz already completed",
                "kind": kind,
                "attempt_id": attempt_id,
            }),
            AppError::ValidationFailed(msg)
            | AppError::InvalidQuestion(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::ResultsNotAvailable(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidState(msg)
            | AppError::Conflict(msg)
            | AppError::TimeLimitExceeded(msg)
            | AppError::OutOfRange(msg) => json!({ "error": msg, "kind": kind }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::StaleState(msg) => AppError::InvalidState(msg),
            StoreError::Corrupt(msg) => AppError::InternalServerError(msg),
            StoreError::Database(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationFailed(err.to_string())
    }
}
