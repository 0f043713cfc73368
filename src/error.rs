//!
//! # Custom Error Handling
//!
//! This module defines `AppError`, the error type returned by every handler.
//! `AppError` implements `actix_web::error::ResponseError`, so handlers can use
//! `?` and still produce a JSON body of the shape `{"error": "..."}`.
//!
//! `From` implementations exist for the error types of the crates this service
//! leans on (`validator`, `jsonwebtoken`, `bcrypt`) and for the storage layer's
//! [`StoreError`].

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Validation failure of a single entry in a bulk request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchFailure {
    /// Position of the rejected entry in the submitted array.
    pub index: usize,
    /// Human-readable validation messages for that entry.
    pub errors: String,
}

/// Represents all possible errors that can occur within the application.
///
/// Each variant maps to one HTTP status code, see [`ResponseError::status_code`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed or is required but missing (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated, but not allowed to access the resource (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Malformed request, bad query parameters or path segments (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// The requested resource does not exist for this user (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// The resource already exists, e.g. a duplicate email (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Input failed field validation (HTTP 422).
    #[error("Validation Error: {0}")]
    ValidationError(String),
    /// Some entries of a bulk request failed validation (HTTP 422).
    #[error("Validation Error: {} of {} tasks rejected", .failures.len(), .failures.len() + .valid)]
    BatchRejected {
        failures: Vec<BatchFailure>,
        valid: usize,
    },
    /// The client exceeded the request budget (HTTP 429).
    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),
    /// A dependency such as the database is not reachable (HTTP 503).
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
    /// Unexpected server-side error (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// Error bubbled up from the storage layer (HTTP 500).
    /// The detail is logged, never sent to the client.
    #[error("Database Error: {0}")]
    DatabaseError(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) | AppError::BatchRejected { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ValidationError(msg)
            | AppError::TooManyRequests(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::InternalServerError(msg) => response.json(json!({ "error": msg })),
            AppError::BatchRejected { failures, valid } => response.json(json!({
                "error": "Some tasks failed validation",
                "validation_errors": failures,
                "valid_tasks_count": valid,
            })),
            AppError::DatabaseError(detail) => {
                log::error!("database error: {}", detail);
                response.json(json!({ "error": "An internal server error occurred." }))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Backend(msg) => AppError::DatabaseError(msg),
        }
    }
}

/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
