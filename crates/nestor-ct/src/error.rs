//! Error types for nestor-ct

use thiserror::Error;

/// Result type for nestor-ct operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors specific to continuous-time execution
#[derive(Debug, Error)]
pub enum Error {
    /// A director parameter is out of range
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Invalid configuration document
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
            other => nestor_core::Error::Config(other.to_string()),
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
    fn test_parameter_errors_are_config_errors_in_core() {
        let err = Error::InvalidParameter {
            name: "step_size",
            reason: "must be positive".into(),
        };
        let core: nestor_core::Error = err.into();
        assert_eq!(core.kind(), nestor_core::ErrorKind::Config);
        assert!(core.to_string().contains("step_size"));
    }

    #[test]
    fn test_timing_violations_pass_through() {
        let core = nestor_core::Error::TimeCollapse {
            director: ".top.plant.ct".into(),
            outer: 2.0,
            local: 1.0,
        };
        let back: nestor_core::Error = Error::from(core).into();
        assert!(back.is_timing_violation());
    }
}
