use crate::services::{listing_service::ListingError, object_store::ObjectStoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
///
/// Service errors convert into this via the `From` impls below, which is
/// where the typed error kinds get their HTTP status. Relational-store
/// details are logged but never forwarded verbatim to the client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
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
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ListingError> for AppError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::CategoryNotFound(_)
            | ListingError::OwnerNotFound(_)
            | ListingError::ListingNotFound(_) => AppError::not_found(err.to_string()),
            ListingError::CategoryAlreadyExists(_) => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            ListingError::PersistenceFailure
            | ListingError::UpdateFailed
            | ListingError::DeleteFailed => {
                tracing::error!("catalog write failed: {}", err);
                AppError::internal("the write could not be completed")
            }
            ListingError::Sqlx(err) => {
                tracing::error!("database error: {}", err);
                AppError::internal("internal storage error")
            }
        }
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::BlobNotFound(_) => AppError::not_found(err.to_string()),
            ObjectStoreError::InvalidKey | ObjectStoreError::InvalidToken => {
                AppError::bad_request(err.to_string())
            }
            ObjectStoreError::TokenExpired => AppError::new(StatusCode::GONE, err.to_string()),
            ObjectStoreError::Io(err) => {
                tracing::error!("object store I/O error: {}", err);
                AppError::internal("object store unavailable")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
