//! Error types for weft-core operations

use weft_backends::BackendError;

/// Result type for weft-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by array handles, algorithms and dispatch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An allocation could not be satisfied
    #[error("out of memory: requested {requested_bytes} bytes")]
    OutOfMemory { requested_bytes: usize },

    /// Missing data or inconsistent arguments, detected in the control environment
    #[error("bad value: {0}")]
    BadValue(String),

    /// A unit of work raised an error during a schedule; carries the first message
    #[error("{0}")]
    Execution(String),

    /// Any other backend failure
    #[error(transparent)]
    Backend(BackendError),
}

impl Error {
    /// Create a bad-value error
    pub fn bad_value(msg: impl Into<String>) -> Self {
        Self::BadValue(msg.into())
    }

    /// Message carried by an execution error
    pub fn execution_message(&self) -> Option<&str> {
        match self {
            Self::Execution(message) => Some(message),
            _ => None,
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::OutOfMemory { requested_bytes } => Self::OutOfMemory { requested_bytes },
            BackendError::Execution(message) => Self::Execution(message),
            BackendError::LengthMismatch { .. } => Self::BadValue(err.to_string()),
            other => Self::Backend(other),
        }
    }
}
