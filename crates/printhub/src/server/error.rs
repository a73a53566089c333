use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::error::PrintHubError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": {
                "kind": self.kind,
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<PrintHubError> for ApiError {
    fn from(err: PrintHubError) -> Self {
        let kind = err.kind();
        match err {
            PrintHubError::Validation(e) => Self::new(StatusCode::BAD_REQUEST, kind, e.to_string()),
            PrintHubError::NotFound { id } => {
                Self::new(StatusCode::NOT_FOUND, kind, format!("Job not found: {}", id))
            }
            err @ PrintHubError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, kind, err.to_string())
            }
            err => {
                tracing::error!(error = %err, kind, "request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    kind,
                    "An internal server error occurred.",
                )
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        Self::internal("An internal server error occurred.")
    }
}
