use thiserror::Error;

/// Result alias used throughout the crate.
pub type TrainerResult<T> = Result<T, TrainerError>;

/// Errors surfaced by the session, the collaborators and the training loop.
///
/// Nothing in the crate retries; every variant propagates to the caller.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A tensor or matrix did not have the shape the consumer expects.
    #[error("Shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// A checkpoint record is readable but cannot be restored.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Data error: {0}")]
    Data(String),
}

impl TrainerError {
    pub fn shape_mismatch(what: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}
