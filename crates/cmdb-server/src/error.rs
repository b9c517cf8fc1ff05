//! API error types and handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cmdb::CmdbError;
use serde_json::json;
use thiserror::Error;

/// API error type. Rendered as `{"status": "failure", "message": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown endpoint or entity.
    #[error("{0}")]
    NotFound(String),

    /// Malformed JSON, missing fields or bad query parameters.
    #[error("{0}")]
    BadRequest(String),

    /// Request conflicts with current state (duplicate id, level in use).
    #[error("{0}")]
    Conflict(String),

    /// Known endpoint, unsupported method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Persistence failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        }
        let body = json!({
            "status": "failure",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<CmdbError> for ApiError {
    fn from(err: CmdbError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else if err.is_constraint_violation() {
            ApiError::Conflict(err.to_string())
        } else {
            match err {
                CmdbError::Validation { message } => ApiError::BadRequest(message),
                err => ApiError::Internal(err.to_string()),
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {err}"))
    }
}
