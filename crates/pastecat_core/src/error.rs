//! Error types for paste storage and its configuration.
use thiserror::Error;

/// Top-level error type shared by every store backend.
///
/// Each variant is a stable identity the HTTP layer maps to a status code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("paste could not be found")]
    NotFound,

    #[error("invalid paste id: {0}")]
    InvalidId(String),

    #[error("paste content is empty")]
    EmptyPaste,

    #[error("paste of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("reached maximum number of pastes")]
    ReachedMaxNumber,

    #[error("reached maximum storage of pastes")]
    ReachedMaxStorage,

    #[error("gave up trying to find an unused random id")]
    NoUnusedId,

    #[error("cannot recover data directory: {0}")]
    Recovery(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this error comes from the capacity controller or id space.
    ///
    /// # Returns
    /// `true` for count, storage and id-exhaustion failures.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::ReachedMaxNumber | Self::ReachedMaxStorage | Self::NoUnusedId
        )
    }
}
