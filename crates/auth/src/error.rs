//! Auth error kinds

use thiserror::Error;

/// Authorization pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// ACL write referenced usernames that are not project members
    #[error("users not found: {}", .0.join(", "))]
    UsersNotFound(Vec<String>),
}

/// Result type for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;
