// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for entire application

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use sqlx::postgres::PgDatabaseError;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// When set, 500 responses carry the internal error detail (development only)
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

/// Application-specific error types
/// DOCUMENTATION: Operational variants carry a client-facing message.
/// Database, ExternalApi and Internal are programming/infrastructure
/// failures and are rendered as an opaque 500.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid input data. {0}")]
    ValidationError(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Too many requests from this IP. Please try again in an hour.")]
    RateLimitExceeded,

    #[error("Request body is too large.")]
    PayloadTooLarge,

    /// Operational failure that still maps to 500 (e.g. mail delivery)
    #[error("{0}")]
    ServiceFailure(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn not_found() -> Self {
        AppError::NotFound("No document found with that ID".to_string())
    }

    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::DatabaseError(_) | AppError::ExternalApiError(_) | AppError::InternalError(_)
        )
    }

    /// Message safe to show to a client
    pub fn public_message(&self) -> String {
        if self.is_operational() {
            self.to_string()
        } else {
            "Something went wrong!".to_string()
        }
    }
}

/// Convert AppError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let status_text = if status.is_client_error() { "fail" } else { "error" };

        let mut body = json!({
            "status": status_text,
            "message": self.public_message(),
        });

        if !self.is_operational() {
            log::error!("Unhandled error: {}", self);
            if EXPOSE_DETAILS.load(Ordering::Relaxed) {
                body["error"] = json!(self.to_string());
            }
        }

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalApiError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::not_found(),
            sqlx::Error::Database(db_err) => {
                let detail = db_err
                    .try_downcast_ref::<PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .unwrap_or_else(|| db_err.message())
                    .to_string();

                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => AppError::BadRequest(format!(
                        "Duplicate field value: {}. Please use another value.",
                        duplicate_value(&detail)
                    )),
                    // foreign_key_violation
                    Some("23503") => {
                        AppError::BadRequest("Referenced document does not exist.".to_string())
                    }
                    // check_violation
                    Some("23514") => AppError::ValidationError(format!(
                        "Constraint {} failed.",
                        db_err.constraint().unwrap_or("check")
                    )),
                    // invalid_text_representation
                    Some("22P02") => AppError::BadRequest(format!("Invalid value: {}", detail)),
                    _ => AppError::DatabaseError(e.to_string()),
                }
            }
            _ => AppError::DatabaseError(e.to_string()),
        }
    }
}

/// Pull the offending value out of a Postgres "Key (col)=(value) already exists." detail
fn duplicate_value(detail: &str) -> String {
    detail
        .split_once(")=(")
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(value, _)| format!("'{}'", value))
        .unwrap_or_else(|| detail.to_string())
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::ValidationError(messages.join(". "))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized(
                "Access Denied: Expired JWT Token. Please login again!".to_string(),
            ),
            _ => AppError::Unauthorized(
                "Access Denied: Invalid token. Please login again.".to_string(),
            ),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::InternalError(format!("Password hashing failed: {}", e))
    }
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        AppError::InternalError(format!("Template rendering failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 5, message = "Name must be at least 5 characters long"))]
        name: String,
        #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
        rating: f64,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimitExceeded.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::DatabaseError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_operational_error_body() {
        let resp = AppError::BadRequest("Email and password are required".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["message"], "Email and password are required");
    }

    #[actix_web::test]
    async fn test_programming_error_is_opaque() {
        let resp = AppError::DatabaseError("connection reset".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Something went wrong!");
        assert!(!json["message"].as_str().unwrap().contains("connection reset"));
    }

    #[test]
    fn test_validation_messages_are_joined() {
        let sample = Sample {
            name: "abc".into(),
            rating: 7.0,
        };
        let err: AppError = sample.validate().unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "Invalid input data. Name must be at least 5 characters long. Rating must be between 1 and 5"
        );
    }

    #[test]
    fn test_duplicate_value_extraction() {
        assert_eq!(
            duplicate_value("Key (email)=(jonas@example.com) already exists."),
            "'jonas@example.com'"
        );
        assert_eq!(duplicate_value("something else"), "something else");
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
