//! Error types for Huddle.

use thiserror::Error;

/// Common error type for Huddle.
#[derive(Error, Debug)]
pub enum HuddleError {
    /// I/O error on a socket or file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration parsed but holds an unusable value.
    #[error("validation error: {0}")]
    Validation(String),

    /// The display-name handshake was missing or malformed.
    ///
    /// No registry entry exists for a connection that fails here.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A client line exceeded the configured maximum length.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured limit, terminator included.
        limit: usize,
    },

    /// The completion service failed or returned an unusable response.
    #[error("completion error: {0}")]
    Completion(String),
}

/// Result type alias for Huddle operations.
pub type Result<T> = std::result::Result<T, HuddleError>;
