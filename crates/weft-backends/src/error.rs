//! Error types for backend operations

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while allocating, moving or scheduling on a device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// An allocation could not be satisfied
    #[error("out of memory: requested {requested_bytes} bytes")]
    OutOfMemory { requested_bytes: usize },

    /// A unit of work raised an error inside a schedule call
    #[error("{0}")]
    Execution(String),

    /// Shrink was asked to grow an array
    #[error("shrink cannot grow an array: requested {requested} values, array holds {size}")]
    ShrinkOutOfRange { requested: usize, size: usize },

    /// A destination or companion slice has the wrong length
    #[error("length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl BackendError {
    /// Create an out-of-memory error for `count` values of `T`
    pub fn out_of_memory<T>(count: usize) -> Self {
        Self::OutOfMemory {
            requested_bytes: count.saturating_mul(std::mem::size_of::<T>()),
        }
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_saturates() {
        let err = BackendError::out_of_memory::<f64>(usize::MAX);
        assert_eq!(err, BackendError::OutOfMemory { requested_bytes: usize::MAX });
    }

    #[test]
    fn test_execution_message_is_verbatim() {
        assert_eq!(BackendError::execution("Got an error.").to_string(), "Got an error.");
    }
}
