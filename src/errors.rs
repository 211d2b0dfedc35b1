use crate::services::{blob_store::PolicyError, file_service::FileError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Internal error text attached to a response.
///
/// Carried as a response extension so the error-detail middleware can decide
/// whether clients get to see it.
#[derive(Clone, Debug)]
pub struct ErrorDetail(pub String);

/// An error rendered as the `{ success: false, message }` envelope.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            detail: None,
        }
    }

    /// A 500 with a generic client message. The detail is logged and only
    /// shown to clients outside production.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".into(),
            detail: Some(detail.into()),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                "{} {}: {}",
                self.status.as_u16(),
                self.message,
                self.detail.as_deref().unwrap_or("-")
            );
        }

        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));

        let mut response = (self.status, body).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Policy(PolicyError::TooLarge { .. }) => {
                AppError::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            FileError::Policy(PolicyError::DisallowedExtension { .. }) => {
                AppError::bad_request(err.to_string())
            }
            FileError::NotFound(_) => AppError::not_found("File not found"),
            FileError::Conflict(detail) => AppError {
                status: StatusCode::CONFLICT,
                message: "Duplicate entry found".into(),
                detail: Some(detail),
            },
            FileError::Io(err) => AppError::internal(format!("io: {}", err)),
            FileError::Database(err) => AppError::internal(format!("database: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn file_errors_map_to_status_classes() {
        let cases = [
            (
                FileError::Policy(PolicyError::TooLarge { limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                FileError::Policy(PolicyError::DisallowedExtension {
                    extension: "exe".into(),
                    allowed: "txt".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (FileError::NotFound(3), StatusCode::NOT_FOUND),
            (FileError::Conflict("unique".into()), StatusCode::CONFLICT),
            (
                FileError::Io(io::Error::other("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_keep_detail_out_of_message() {
        let err = AppError::from(FileError::Io(io::Error::other("disk on fire")));
        assert_eq!(err.message, "Internal server error");
        assert!(err.detail.unwrap().contains("disk on fire"));
    }
}
