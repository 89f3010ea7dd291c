//! Error types for nestor-sched

use nestor_core::{ActorId, Time};
use thiserror::Error;

/// Result type for nestor-sched operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scheduling
#[derive(Debug, Error)]
pub enum Error {
    /// Execution times cannot be negative
    #[error("negative execution time {execution_time} requested for {actor}")]
    NegativeExecutionTime { actor: ActorId, execution_time: f64 },

    /// The scheduler was invoked with a time earlier than its last invocation
    #[error("scheduler invoked at {now}, before its last invocation at {last}")]
    TimeWentBackward { now: Time, last: Time },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] nestor_core::Error),
}

impl From<ron::error::SpannedError> for Error {
    fn from(err: ron::error::SpannedError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<Error> for nestor_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(inner) => inner,
            Error::Config(message) => nestor_core::Error::Config(message),
            other => nestor_core::Error::InvalidArgument(other.to_string()),
        }
    }
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_unwrap_on_conversion() {
        let core = nestor_core::Error::EmptyQueue(".top.a.in".into());
        let wrapped: Error = core.into();
        let back: nestor_core::Error = wrapped.into();
        assert!(matches!(back, nestor_core::Error::EmptyQueue(_)));
    }

    #[test]
    fn test_scheduling_errors_become_invalid_arguments() {
        let err = Error::NegativeExecutionTime {
            actor: ActorId::new(4),
            execution_time: -1.0,
        };
        let core: nestor_core::Error = err.into();
        assert_eq!(core.kind(), nestor_core::ErrorKind::Range);
        assert!(core.to_string().contains("actor:4"));
    }
}
