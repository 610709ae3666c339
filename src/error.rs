// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types: the store's closed taxonomy and the HTTP-facing `AppError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error kinds callers switch on. Never match on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    AlreadyExists,
    Validation,
    Invalid,
    Unknown,
}

/// Errors returned by the document store, the resource store and the domain
/// services.
///
/// Every variant carries context (collection, operation, identifiers) for
/// logging.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    /// Stored value could not be decoded into the requested type.
    #[error("failed to decode stored value: {0}")]
    Decode(String),

    #[error("unknown store error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::Forbidden(_) => ErrorKind::Forbidden,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Invalid(_) | StoreError::Decode(_) => ErrorKind::Invalid,
            StoreError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Prefix the message with additional context, keeping the kind.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            StoreError::NotFound(m) => StoreError::NotFound(format!("{context}: {m}")),
            StoreError::AlreadyExists(m) => StoreError::AlreadyExists(format!("{context}: {m}")),
            StoreError::Forbidden(m) => StoreError::Forbidden(format!("{context}: {m}")),
            StoreError::Validation(m) => StoreError::Validation(format!("{context}: {m}")),
            StoreError::Invalid(m) => StoreError::Invalid(format!("{context}: {m}")),
            StoreError::Decode(m) => StoreError::Decode(format!("{context}: {m}")),
            StoreError::Unknown(m) => StoreError::Unknown(format!("{context}: {m}")),
        }
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        StoreError::Validation(errors.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Unprocessable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Map a store error for a resource whose existence must not leak to
    /// non-owners: `Forbidden` becomes `NotFound`.
    pub fn concealed(err: StoreError) -> Self {
        match err {
            StoreError::Forbidden(msg) => {
                tracing::debug!(reason = %msg, "Concealing forbidden resource as not found");
                AppError::NotFound("resource not found".to_string())
            }
            other => other.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            ErrorKind::Forbidden => AppError::Forbidden(err.to_string()),
            ErrorKind::AlreadyExists => AppError::Conflict(err.to_string()),
            ErrorKind::Validation => AppError::Unprocessable(err.to_string()),
            ErrorKind::Invalid => AppError::BadRequest(err.to_string()),
            ErrorKind::Unknown => AppError::Database(err.to_string()),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
