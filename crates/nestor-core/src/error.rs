//! Error types for nestor-core
//!
//! Every error that concerns a piece of the model carries the dotted path of
//! the implicated actor, port, relation or director (for example
//! `.top.plant.output`), so failures can be traced back through nested
//! composites without extra context.

use crate::time::Time;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
///
/// Directors use this to decide whether a failure is fatal to the requested
/// operation (structural), fatal to the run (timing), or something the
/// caller was expected to guard against (range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed model or illegal lifecycle request
    Structural,
    /// Inconsistent notion of time between nested directors
    Timing,
    /// Queue access outside its current contents
    Range,
    /// Failure reported by an actor body
    Actor,
    /// Invalid configuration
    Config,
}

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("{actor}: cannot {operation} without a director")]
    NoDirector {
        actor: String,
        operation: &'static str,
    },

    #[error("cannot link {port} to incompatible relation {relation}")]
    IncompatibleLink { port: String, relation: String },

    #[error("{actor}: cannot set the executive director of an actor with a container")]
    IllegalExecutiveDirector { actor: String },

    #[error("cannot place {actor} inside {container}: recursive containment")]
    RecursiveContainment { actor: String, container: String },

    #[error("{port} is not an input port")]
    NotAnInput { port: String },

    #[error("{port} is not an output port")]
    NotAnOutput { port: String },

    #[error("cannot {operation} {subject} while an iteration is in progress")]
    MutationDuringIteration {
        subject: String,
        operation: &'static str,
    },

    #[error("director {director} cannot serve as the inside director of {actor}")]
    IllegalInsideDirector { director: String, actor: String },

    #[error("director {director} is already executing and cannot be re-entered")]
    DirectorBusy { director: String },

    #[error("unknown {0}")]
    UnknownEntity(String),

    #[error("{director}: outside time going backward (current {current}, next iteration {next})")]
    OuterTimeRegressed {
        director: String,
        current: Time,
        next: Time,
    },

    #[error("{director}: time collapse (outside time {outer} is ahead of local time {local})")]
    TimeCollapse {
        director: String,
        outer: Time,
        local: Time,
    },

    #[error("{director}: cannot roll back to {target}, known-good state is at {known_good:?}")]
    RollbackUnavailable {
        director: String,
        target: Time,
        known_good: Option<Time>,
    },

    #[error("{director}: iteration end time {end} is before the current time {current}")]
    IterationEndInPast {
        director: String,
        end: Time,
        current: Time,
    },

    #[error("no token available in {0}")]
    EmptyQueue(String),

    #[error("offset {offset} out of range for queue of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("actor {actor} failed: {message}")]
    Actor { actor: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoDirector { .. }
            | Error::IncompatibleLink { .. }
            | Error::IllegalExecutiveDirector { .. }
            | Error::RecursiveContainment { .. }
            | Error::NotAnInput { .. }
            | Error::NotAnOutput { .. }
            | Error::MutationDuringIteration { .. }
            | Error::IllegalInsideDirector { .. }
            | Error::DirectorBusy { .. }
            | Error::UnknownEntity(_) => ErrorKind::Structural,
            Error::OuterTimeRegressed { .. }
            | Error::TimeCollapse { .. }
            | Error::RollbackUnavailable { .. }
            | Error::IterationEndInPast { .. } => ErrorKind::Timing,
            Error::EmptyQueue(_) | Error::OffsetOutOfRange { .. } | Error::InvalidArgument(_) => {
                ErrorKind::Range
            }
            Error::Actor { .. } => ErrorKind::Actor,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if this is a timing violation
    pub fn is_timing_violation(&self) -> bool {
        self.kind() == ErrorKind::Timing
    }

    /// Check if this is a structural error
    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }

    /// Build an actor failure from anything printable
    pub fn actor(actor: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Actor {
            actor: actor.into(),
            message: message.to_string(),
        }
    }
}

impl From<ron::error::SpannedError> for Error {
    fn from(err: ron::error::SpannedError) -> Self {
        Error::Config(err.to_string())
    }
}

// Compile-time check that Error is Send + Sync so it can cross thread
// boundaries in embedding applications.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
