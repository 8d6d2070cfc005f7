//! Error types for the record stores.

use thiserror::Error;

/// Result type alias for record store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while loading or persisting a store file.
///
/// Each variant carries a message that includes the file path.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("read error: {0}")]
    Read(String),

    /// The file exists but does not decode. Nothing is written over it;
    /// an operator has to repair or move it.
    #[error("corrupt store file: {0}")]
    Corrupt(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl StateError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StateError::Corrupt(_))
    }
}
