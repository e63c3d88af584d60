//! Store error kinds
//!
//! Errors signal semantic conditions, not transport details. The HTTP layer
//! maps each kind to a status code at the handler boundary.

use thiserror::Error;

/// Semantic store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The requested entity does not exist
    #[error("not found")]
    NotFound,

    /// An entity with the same identity already exists
    #[error("exists")]
    Exists,

    /// Ack received while no pull window is open
    #[error("no ack pending")]
    NoAckPending,

    /// Ack offset outside the open pull window
    #[error("wrong ack")]
    WrongAck,

    /// Ack arrived after the subscription's ack deadline
    #[error("ack timeout")]
    AckTimeout,

    /// Backend failure with no finer classification
    #[error("store error: {0}")]
    Internal(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
