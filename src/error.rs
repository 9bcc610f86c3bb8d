use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Outcomes of the pure scheduling/import core.
/// None of these are fatal; callers turn them into operator-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No date in the range matches the selected weekdays")]
    EmptyResult,

    #[error("{} duplicate record(s) still need a resolution", unresolved.len())]
    ResolutionIncomplete { unresolved: Vec<usize> },

    #[error("Coach not found: {0}")]
    ParentNotFound(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Csv(e) => (StatusCode::BAD_REQUEST, format!("Malformed CSV: {}", e)),
            AppError::Schedule(e) => match e {
                ScheduleError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                ScheduleError::EmptyResult => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                ScheduleError::ResolutionIncomplete { .. } => (StatusCode::CONFLICT, e.to_string()),
                ScheduleError::ParentNotFound(_) => {
                    error!("dangling coach reference: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            },
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Serialization(e) => {
                error!("stored collection is corrupt: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Stored data could not be read".to_string(),
                )
            }
            AppError::Config(msg) => {
                error!("configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
