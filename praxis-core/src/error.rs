//! Error types for Praxis operations

/// Result type for Praxis operations
pub type Result<T> = std::result::Result<T, PraxisError>;

/// Error types for the Praxis tool framework
#[derive(Debug, thiserror::Error)]
pub enum PraxisError {
    /// Transport-level connect/read/write failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed or missing `initialize` result
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// No matching response within the read timeout, or heartbeat silence
    #[error("{0}")]
    Timeout(String),

    /// Malformed or unparseable inbound message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Credential rejected or connection not authenticated
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Admission denied by the local rate limiter
    #[error("Rate limit exceeded for tool: {0}")]
    RateLimitExceeded(String),

    /// Operation, tool, or resource not in the discovered catalog
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Error result returned by the remote peer
    #[error("Server error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// JSON-RPC error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PraxisError {
    /// Timeout with the canonical message used for pending-request expiry.
    pub fn request_timeout() -> Self {
        PraxisError::Timeout("Request timeout".to_string())
    }
}

impl From<String> for PraxisError {
    fn from(s: String) -> Self {
        PraxisError::Other(s)
    }
}

impl From<&str> for PraxisError {
    fn from(s: &str) -> Self {
        PraxisError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for PraxisError {
    fn from(err: anyhow::Error) -> Self {
        PraxisError::Other(err.to_string())
    }
}
