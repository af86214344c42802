//! Error types for the valve control server

use thiserror::Error;

/// Result type alias for valve operations
pub type Result<T> = std::result::Result<T, ValveError>;

/// Error types for valve control operations
#[derive(Error, Debug)]
pub enum ValveError {
    /// Serial line could not be opened or the probe handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// No response from the device within the read deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A response arrived but did not match the expected grammar
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Caller-supplied argument out of range or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reconnect cap reached; the device is considered unreachable
    #[error("Connection attempts exhausted: {0}")]
    ConnectionExhausted(String),

    /// Valve name not present in the registry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl ValveError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Check if the error is worth retrying at a higher layer
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ValveError::Connection(_)
                | ValveError::Timeout(_)
                | ValveError::Io(_)
                | ValveError::Serial(_)
        )
    }

    /// Check if the error came from the caller rather than the device
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ValveError::InvalidInput(_) | ValveError::NotFound(_))
    }
}
