//! API error types
//!
//! Every failure leaves the service as the one JSON envelope:
//!
//! ```json
//! {"error": {"code": 404, "message": "Topic does not exist", "status": "NOT_FOUND"}}
//! ```

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use courier_messaging::MessagingError;

/// API errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Request content failed validation
    #[error("{0}")]
    Invalid(String),

    /// Missing or unknown credential
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Access to this resource is forbidden")]
    Forbidden,

    /// Resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Ack arrived after the deadline
    #[error("ack timeout")]
    AckTimeout,

    /// Resource already exists
    #[error("{0}")]
    Conflict(String),

    /// Message payload over the broker's size limit
    #[error("Message size too large")]
    PayloadTooLarge,

    /// Anything unexpected
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AckTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable status label for the envelope
    pub fn status(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AckTimeout => "TIMEOUT",
            Self::Conflict(_) => "ALREADY_EXISTS",
            Self::PayloadTooLarge => "INVALID_ARGUMENT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    // Helper constructors

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::NotFound => Self::NotFound("Resource does not exist".into()),
            MessagingError::Exists => Self::Conflict("Resource already exists".into()),
            MessagingError::Invalid(msg) => Self::Invalid(msg),
            MessagingError::NoAckPending => Self::Invalid("no ack pending".into()),
            MessagingError::WrongAck => Self::Invalid("wrong ack".into()),
            MessagingError::AckTimeout => Self::AckTimeout,
            MessagingError::PayloadTooLarge => Self::PayloadTooLarge,
            MessagingError::Broker(msg) => Self::Internal(msg),
            MessagingError::Inconsistent(msg) => Self::Internal(msg),
            MessagingError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "status": self.status(),
            }
        });

        tracing::warn!(
            status = %status,
            error_status = self.status(),
            error_message = %self,
            "API error"
        );

        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }
}

/// Result type for API handlers
pub type Result<T> = std::result::Result<T, ApiError>;
