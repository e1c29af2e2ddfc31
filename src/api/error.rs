use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::assign::AssignError;
use crate::filter::FilterError;
use crate::qa::QaError;

/// API error taxonomy. Internal errors are logged with their cause and
/// returned to the client as an opaque 500.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(e) => {
                error!("internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<QaError> for ApiError {
    fn from(e: QaError) -> Self {
        match e {
            QaError::QuestionNotFound(_) => ApiError::NotFound(e.to_string()),
            QaError::InvalidTransition { .. }
            | QaError::ReviewerRequired(_)
            | QaError::RatingOutOfRange { .. } => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<AssignError> for ApiError {
    fn from(e: AssignError) -> Self {
        match e {
            AssignError::QuestionNotFound(_) => ApiError::NotFound(e.to_string()),
            AssignError::Duplicate(_) => ApiError::Conflict(e.to_string()),
            AssignError::MissingAssignee
            | AssignError::UnknownAssignee(_)
            | AssignError::InvalidTransition { .. }
            | AssignError::Filter(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}
