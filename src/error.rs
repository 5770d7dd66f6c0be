// Error types for the motion controller

use crate::config::MAX_CHANNELS;

/// Errors returned by controller operations
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Failed to start motion worker: {0}")]
    ResourceExhausted(#[source] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Command queue is full")]
    QueueFull,

    #[error("Motion controller has been destroyed")]
    Closed,

    #[error("Stopped by stop-all before all steps were submitted")]
    Stopped,

    #[error("Malformed motion document: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("Motion document has no `motions`/`m` array")]
    MissingMotions,

    #[error("Invalid motion step {index}: {reason}")]
    Validation { index: usize, reason: StepError },

    #[error("Unknown motion kind `{0}`")]
    UnknownMotionKind(String),
}

impl MotionError {
    /// True for failures of the document as a whole (nothing was submitted)
    pub fn is_parse_error(&self) -> bool {
        matches!(self, MotionError::Syntax(_) | MotionError::MissingMotions)
    }

    pub(crate) fn too_many_channels(count: usize) -> Self {
        MotionError::InvalidArgument(format!(
            "channel count {} exceeds maximum of {}",
            count, MAX_CHANNELS
        ))
    }
}

/// Why a single document step was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("step is not an object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` value {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("unknown step type `{0}`")]
    UnknownType(String),

    #[error("{channels} channels but {angles} target angles")]
    LengthMismatch { channels: usize, angles: usize },
}

pub type Result<T> = std::result::Result<T, MotionError>;
