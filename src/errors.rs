//! Error types for storage access and HTTP handlers.
//!
//! [`StorageError`] is what every backend returns.  Remote "not found" is
//! its own variant so the façade can absorb it where absence is a valid
//! outcome.  [`AppError`] implements [`axum::response::IntoResponse`] so
//! handlers can simply return `Err(AppError::NotFound)`.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::templates;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Failure talking to a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The addressed table, entity, blob, file, queue, or message does not exist.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The service answered with a non-success status.
    #[error("Azure {operation} failed: HTTP {status} - {body}")]
    Remote {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The connection string or resource configuration is unusable.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Anything else (malformed payloads, timeouts).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        StorageError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// HTTP status reported by the service, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::NotFound { .. } => Some(404),
            StorageError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by page handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// The page or record does not exist.
    #[error("The requested resource was not found")]
    NotFound,

    /// The submitted form could not be read.
    #[error("{0}")]
    BadRequest(String),

    /// A storage call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A page template failed to render.
    #[error("page rendering failed: {0}")]
    Template(#[from] tera::Error),
}

impl AppError {
    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::Remote { .. })
            | AppError::Storage(StorageError::Transport(_)) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, error = %self, "request failed");
        } else {
            tracing::debug!(request_id = %request_id, error = %self, "request rejected");
        }

        let message = self.to_string();
        let body = templates::render_error(status.as_u16(), &message, &request_id)
            .unwrap_or_else(|_| format!("{} {}", status.as_u16(), message));

        (status, [("x-request-id", request_id)], Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_not_found_helpers() {
        let err = StorageError::not_found("blob 'a.png'");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "blob 'a.png' not found");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::BadRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let remote = AppError::Storage(StorageError::Remote {
            operation: "upload",
            status: 403,
            body: "AuthenticationFailed".into(),
        });
        assert_eq!(remote.status_code(), StatusCode::BAD_GATEWAY);
        let missing = AppError::Storage(StorageError::not_found("file"));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        let config = AppError::Storage(StorageError::Config("no key".into()));
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_sets_status_and_request_id() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().contains_key("x-request-id"));
    }
}
