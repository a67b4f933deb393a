//! Error types for vap-mark
//!
//! Every variant maps to one HTTP status; response bodies always carry
//! `{success: false, code, message}` so the dashboard can show `message` as-is.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::recognition::RecognizerError;

/// Main error type for vap-mark
#[derive(Debug, Error)]
pub enum Error {
    /// Required request field absent or empty (400)
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Request field present but unusable (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Recognizer unreachable, timed out or answered with a non-success status (502)
    #[error("Face recognition service unavailable: {0}")]
    RecognizerUnavailable(String),

    /// No session under the given id or session id (404)
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already closed; marks against it are rejected (409)
    #[error("Session is closed: {0}")]
    SessionClosed(String),

    /// Unknown-face entry lookup miss (404)
    #[error("Unknown face entry not found: {0}")]
    EntryNotFound(String),

    /// Student lookup miss on a directory operation (404)
    #[error("Student not found: {0}")]
    StudentNotFound(String),

    /// Uniqueness violation outside the ledger, e.g. a reused roll number (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage layer failure (500)
    #[error("Persistence error: {0}")]
    Persistence(#[from] vap_common::Error),
}

impl Error {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RecognizerUnavailable(_))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::MissingInput(_) => (StatusCode::BAD_REQUEST, "MISSING_INPUT"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Error::RecognizerUnavailable(_) => (StatusCode::BAD_GATEWAY, "RECOGNIZER_UNAVAILABLE"),
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            Error::SessionClosed(_) => (StatusCode::CONFLICT, "SESSION_CLOSED"),
            Error::EntryNotFound(_) => (StatusCode::NOT_FOUND, "ENTRY_NOT_FOUND"),
            Error::StudentNotFound(_) => (StatusCode::NOT_FOUND, "STUDENT_NOT_FOUND"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Error::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<RecognizerError> for Error {
    fn from(err: RecognizerError) -> Self {
        Error::RecognizerUnavailable(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "code": code,
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}

/// Convenience Result type using vap-mark Error
pub type Result<T> = std::result::Result<T, Error>;
