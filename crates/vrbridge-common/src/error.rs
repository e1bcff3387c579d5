//! Common error types for vrbridge.

use thiserror::Error;

/// Result type alias using vrbridge's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for provider operations.
///
/// Transient conditions (mirror acquisition retries, missing hidden-area meshes,
/// unreadable device properties) are absorbed by the providers and never show up
/// here. What remains is reported to the host as a subsystem failure.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading settings
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be parsed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The host passed an argument the provider cannot work with
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested feature or backend is not supported
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The VR runtime reported a failure
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A host engine callback failed
    #[error("host error: {0}")]
    Host(String),

    /// Resource not found (device id, texture, ...)
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create an invalid argument error from any displayable type.
    pub fn invalid_argument(msg: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Create an unsupported error from any displayable type.
    pub fn unsupported(msg: impl std::fmt::Display) -> Self {
        Self::Unsupported(msg.to_string())
    }

    /// Create a runtime error from any displayable type.
    pub fn runtime(msg: impl std::fmt::Display) -> Self {
        Self::Runtime(msg.to_string())
    }

    /// Create a host error from any displayable type.
    pub fn host(msg: impl std::fmt::Display) -> Self {
        Self::Host(msg.to_string())
    }

    /// Create a not found error from any displayable type.
    pub fn not_found(msg: impl std::fmt::Display) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Whether the host should see this as a bad call rather than a failure.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
