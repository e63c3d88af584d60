//! Messaging error kinds
//!
//! Domain-level kinds the HTTP layer maps to status codes. Store and broker
//! errors convert into these so handlers match on one enum.

use courier_broker::BrokerError;
use courier_store::StoreError;
use thiserror::Error;

/// Errors from the topic and subscription services
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    Exists,

    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("no ack pending")]
    NoAckPending,

    #[error("wrong ack")]
    WrongAck,

    #[error("ack timeout")]
    AckTimeout,

    #[error("message payload too large")]
    PayloadTooLarge,

    #[error("broker error: {0}")]
    Broker(String),

    /// The broker acknowledged a different resource than was addressed
    #[error("broker inconsistency: {0}")]
    Inconsistent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for MessagingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Exists => Self::Exists,
            StoreError::NoAckPending => Self::NoAckPending,
            StoreError::WrongAck => Self::WrongAck,
            StoreError::AckTimeout => Self::AckTimeout,
            StoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<BrokerError> for MessagingError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::PayloadTooLarge => Self::PayloadTooLarge,
            BrokerError::Backend(msg) => Self::Broker(msg),
        }
    }
}

/// Result type for messaging operations
pub type Result<T> = std::result::Result<T, MessagingError>;
