//! Unified error handling for Tourdesk
//!
//! Every failure in the booking core is expressed as an [`AppError`]. Capacity and
//! validation errors are raised before any mutation; gateway errors abort the
//! operation that triggered them; notification errors are logged by callers and
//! never surface here as a failed request.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ==================== Booking Errors ====================
    #[error(
        "Capacity exceeded for session {session_id}: requested {requested}, available {available}"
    )]
    CapacityExceeded {
        session_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(i64),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Compensation aborted at reservation {reservation_id}: {reason}")]
    CompensationAborted { reservation_id: i64, reason: String },

    // ==================== Not Found Errors ====================
    #[error("Excursion not found: {0}")]
    ExcursionNotFound(i64),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(i64),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Internal Errors ====================
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::ExcursionNotFound(_)
            | AppError::SessionNotFound(_)
            | AppError::ReservationNotFound(_)
            | AppError::ScheduleNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::CapacityExceeded { .. }
            | AppError::InvalidTransition(_)
            | AppError::AlreadyCancelled(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway
            AppError::PaymentGateway(_) | AppError::CompensationAborted { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::CapacityExceeded { .. } => "capacity_exceeded",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::AlreadyCancelled(_) => "already_cancelled",
            AppError::PaymentGateway(_) => "payment_gateway_error",
            AppError::CompensationAborted { .. } => "compensation_aborted",
            AppError::ExcursionNotFound(_) => "excursion_not_found",
            AppError::SessionNotFound(_) => "session_not_found",
            AppError::ReservationNotFound(_) => "reservation_not_found",
            AppError::ScheduleNotFound(_) => "schedule_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Conflict(_) => "conflict",
            AppError::Notification(_) => "notification_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether a caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::PaymentGateway(_)
                | AppError::CompensationAborted { .. }
                | AppError::Conflict(_)
                | AppError::Pool(_)
                | AppError::Transaction(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => AppError::Pool(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}
