//! Error types for repuestos-cloud
//!
//! Two layers, bridged by `From`:
//!
//! - [`OrderError`] is the order-placement engine's taxonomy. Every failure
//!   inside the placement transaction rolls the transaction back before the
//!   error leaves the db layer, so no partial state is ever observable.
//! - [`AppError`] is the HTTP boundary type: an [`ErrorCode`] plus an
//!   optional specific message, rendered as a JSON body by `IntoResponse`.

use axum::response::IntoResponse;
use http::StatusCode;
use sqlx::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

/// Standard API error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Validation error (400)
    Validation,
    /// Authentication required (401)
    Unauthorized,
    /// Invalid token (401)
    InvalidToken,
    /// Permission denied (403)
    Forbidden,
    /// Resource not found (404)
    NotFound,
    /// Resource already exists (409)
    Conflict,
    /// Requested quantity exceeds available stock (409)
    OutOfStock,
    /// Transient storage conflict, safe to retry (503)
    RetryLater,
    /// Internal server error (500)
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::OutOfStock => StatusCode::CONFLICT,
            Self::RetryLater => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the default message for this error
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Validation => "Validation failed",
            Self::Unauthorized => "Authentication required",
            Self::InvalidToken => "Invalid token",
            Self::Forbidden => "Permission denied",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource already exists",
            Self::OutOfStock => "Insufficient stock",
            Self::RetryLater => "Temporary conflict, try again",
            Self::InternalError => "Internal server error",
        }
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "E0002",
            Self::Unauthorized => "E3001",
            Self::InvalidToken => "E3002",
            Self::Forbidden => "E2001",
            Self::NotFound => "E0003",
            Self::Conflict => "E0004",
            Self::OutOfStock => "E0005",
            Self::RetryLater => "E9003",
            Self::InternalError => "E9001",
        }
    }
}

/// HTTP boundary error: code plus optional specific message.
#[derive(Debug)]
pub struct AppError {
    code: ErrorCode,
    message: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.code.default_message())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "code": self.code.code(),
            "error": self.message(),
        });
        (self.code.status_code(), axum::Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

// ── Order placement engine errors ──

/// Failure modes of the order placement transaction.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing or malformed input; nothing was touched.
    #[error("{0}")]
    Validation(String),

    /// Referenced listing does not exist.
    #[error("listing {0} not found")]
    ListingNotFound(Uuid),

    /// Requested quantity exceeds the listing's available stock.
    #[error("insufficient stock for listing {listing_id}: available {available}, requested {requested}")]
    InsufficientStock {
        listing_id: Uuid,
        available: i32,
        requested: i32,
    },

    /// Storage-level conflict (lock timeout, serialization failure, deadlock).
    /// The whole call is safe to retry.
    #[error("placement transaction aborted")]
    TransactionAbort(#[source] sqlx::Error),

    /// Unexpected persistence error, not retried automatically.
    #[error("storage error")]
    Storage(#[source] sqlx::Error),
}

/// PostgreSQL SQLSTATE codes that mean "retry the whole transaction".
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e
            && let Some(code) = db.code()
            && RETRYABLE_SQLSTATES.contains(&code.as_ref())
        {
            return OrderError::TransactionAbort(e);
        }
        OrderError::Storage(e)
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(msg) => AppError::with_message(ErrorCode::Validation, msg),
            err @ OrderError::ListingNotFound(_) => {
                AppError::with_message(ErrorCode::NotFound, err.to_string())
            }
            err @ OrderError::InsufficientStock { .. } => {
                AppError::with_message(ErrorCode::OutOfStock, err.to_string())
            }
            OrderError::TransactionAbort(source) => {
                tracing::warn!(error = %source, "Placement transaction aborted, client may retry");
                AppError::new(ErrorCode::RetryLater)
            }
            OrderError::Storage(source) => {
                tracing::error!(error = %source, "Placement storage error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(ErrorCode::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OutOfStock.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::RetryLater.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn insufficient_stock_keeps_the_offending_listing() {
        let id = Uuid::new_v4();
        let err = OrderError::InsufficientStock {
            listing_id: id,
            available: 2,
            requested: 3,
        };
        let app: AppError = err.into();
        assert_eq!(app.code(), ErrorCode::OutOfStock);
        assert!(app.message().contains(&id.to_string()));
        assert!(app.message().contains("available 2"));
    }

    #[test]
    fn validation_error_passes_message_through() {
        let app: AppError = OrderError::Validation("items must not be empty".into()).into();
        assert_eq!(app.code(), ErrorCode::Validation);
        assert_eq!(app.message(), "items must not be empty");
    }

    #[test]
    fn storage_error_hides_detail_from_client() {
        let app: AppError = OrderError::Storage(sqlx::Error::PoolClosed).into();
        assert_eq!(app.code(), ErrorCode::InternalError);
        assert_eq!(app.message(), "Internal server error");
    }
}
