//! Error types for reprint-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for reprint-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for reprint operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential file missing, unreadable, or unusable for the operation
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Object key rejected by the storage path rules
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication or permission failure reported by the backend
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or backend failure
    #[error("Network error: {0}")]
    Network(String),

    /// Operation interrupted through the cancellation token
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidKey(_) | Error::InvalidUrl(_) => 2, // UsageError
            Error::Network(_) => 3,                                              // NetworkError
            Error::Credentials(_) | Error::Auth(_) => 4,                         // AuthError
            Error::NotFound(_) => 5,                                             // NotFound
            Error::Cancelled(_) => 130,                                          // Interrupted
        }
    }

    /// Whether this error means the target object or bucket does not exist
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
