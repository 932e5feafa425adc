//! Handler error types

use crate::connection::RegistryError;
use crate::files::StorageError;
use crate::protocol::{CodecError, ServerMessage};
use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session registration failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// JSON with an unknown `type` or a malformed known one
    #[error("Unsupported message: {0}")]
    UnsupportedMessage(String),
}

impl HandlerError {
    /// Whether the connection must be dropped
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::Registry(_))
    }

    /// Notice to send back to the sender, if any
    pub fn to_notice(&self) -> Option<ServerMessage> {
        match self {
            Self::UnsupportedMessage(reason) => {
                Some(ServerMessage::notice(format!("rejected message: {reason}")))
            }
            Self::Storage(StorageError::NotFound(name)) => {
                Some(ServerMessage::notice(format!("file not found: {name}")))
            }
            Self::Storage(StorageError::InvalidFilename(name)) => {
                Some(ServerMessage::notice(format!("invalid filename: {name}")))
            }
            Self::Storage(StorageError::Io(_)) => {
                Some(ServerMessage::notice("file operation failed"))
            }
            Self::Codec(_) | Self::Registry(_) => None,
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
