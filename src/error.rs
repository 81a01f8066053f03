#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Builds the error used when a std mutex turns up poisoned.
pub fn lock_poisoned_error(what: &str) -> ScoutError {
    ScoutError::Internal(format!("{what} lock poisoned"))
}

/// Wraps a failed store operation.
pub fn store_error(error: impl std::fmt::Display) -> ScoutError {
    ScoutError::Store(error.to_string())
}

/// Wraps an encode or decode failure for stored values.
pub fn codec_error(error: impl std::fmt::Display) -> ScoutError {
    ScoutError::Serialization(error.to_string())
}
