//! Error types shared across the scheduler.
//!
//! There are three layers:
//!
//! * [`RoutineError`] is what an inference routine hands back when a call fails.
//! * [`ItemError`] is the `(kind, trace)` pair a single caller receives when its
//!   item could not be processed, even after the per-item fallback.
//! * [`GriddleError`] covers everything a caller of the crate can observe.

use std::fmt;
use thiserror::Error;

/// Failure raised by an inference routine for a whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutineError {
    /// The routine rejected its input or failed while computing.
    #[error("{kind}: {message}")]
    Failed {
        kind: String,
        message: String,
    },

    /// The routine was asked for a named entry point it does not expose.
    #[error("routine has no entry point named `{0}`")]
    UnknownEntryPoint(String),

    /// The routine panicked while the call was in flight.
    #[error("routine panicked: {0}")]
    Panicked(String),

    /// The routine broke the index-for-index contract.
    #[error("routine returned {got} results for a batch of {expected}")]
    LengthMismatch {
        expected: usize,
        got: usize,
    },
}

impl RoutineError {
    /// Convenience constructor for [`RoutineError::Failed`].
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Stable, short name of the failure class.
    pub fn kind(&self) -> &str {
        match self {
            RoutineError::Failed { kind, .. } => kind,
            RoutineError::UnknownEntryPoint(_) => "UnknownEntryPoint",
            RoutineError::Panicked(_) => "Panicked",
            RoutineError::LengthMismatch { .. } => "LengthMismatch",
        }
    }
}

/// The error half of a per-item result.
///
/// `kind` is the failure class, `trace` a human-readable diagnostic that
/// the HTTP layer may log or forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub kind: String,
    pub trace: String,
}

impl ItemError {
    pub fn new(kind: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            trace: trace.into(),
        }
    }
}

impl From<RoutineError> for ItemError {
    fn from(err: RoutineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            trace: err.to_string(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.trace)
    }
}

impl std::error::Error for ItemError {}

/// What a single caller gets back: the routine output for its payload or
/// the isolated failure for that payload alone.
pub type BatchResult<O> = std::result::Result<O, ItemError>;

/// Crate-level error.
#[derive(Debug, Error)]
pub enum GriddleError {
    /// The scheduler loop is gone and can no longer deliver results.
    #[error("scheduler has stopped")]
    SchedulerStopped,

    /// The routine failed for this caller's payload.
    #[error("inference routine failed: {0}")]
    Item(#[from] ItemError),

    /// The configured routine name has no registered factory, or the
    /// factory refused its configuration.
    #[error("unable to resolve inference routine `{name}`: {reason}")]
    RoutineResolution {
        name: String,
        reason: String,
    },

    #[error("invalid Accept header value `{0}`")]
    InvalidAcceptHeader(String),

    #[error("deferred task not found")]
    TaskNotFound,

    #[error("deferred task not done")]
    TaskNotDone,

    #[error("deferred task failed: {0}")]
    TaskFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unable to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GriddleError {
    /// Numeric error code reported to HTTP clients.
    pub fn errno(&self) -> u32 {
        match self {
            GriddleError::InvalidAcceptHeader(_) => 3,
            GriddleError::Item(_) => 7,
            GriddleError::TaskNotFound => 8,
            GriddleError::TaskNotDone => 9,
            GriddleError::TaskFailed(_) => 10,
            _ => 100,
        }
    }

    /// HTTP status the request layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            GriddleError::InvalidAcceptHeader(_) | GriddleError::Item(_) => 400,
            GriddleError::TaskNotFound => 404,
            // an unfinished task is reported as a regular answer
            GriddleError::TaskNotDone => 200,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GriddleError>;
