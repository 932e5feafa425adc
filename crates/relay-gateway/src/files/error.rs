//! Storage error types

use thiserror::Error;

/// File storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    /// Name is empty, contains a separator, or is not a plain file name
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    /// No stored file under this name
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;
