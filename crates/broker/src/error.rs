//! Broker error kinds

use thiserror::Error;

/// Broker client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The payload exceeds the broker's message size limit
    #[error("message payload too large")]
    PayloadTooLarge,

    /// Any other broker-side failure
    #[error("broker error: {0}")]
    Backend(String),
}

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
