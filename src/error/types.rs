//! Error types for the sockbridge relay.

use thiserror::Error;

/// Main error type for the relay.
///
/// Every failure in the relay is fatal: errors are carried up to the
/// top-level handler, logged, and the process exits. Nothing is retried.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket filename parsing errors.
    #[error("Invalid socket name '{name}': {message}")]
    SocketName { name: String, message: String },

    /// Socket lifecycle errors (stale file removal, bind, listen, accept).
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Backend connection errors.
    #[error("Backend error on port {port}: {message}")]
    Backend { port: u32, message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
