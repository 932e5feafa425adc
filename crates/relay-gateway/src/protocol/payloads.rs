//! Binary payload definitions
//!
//! Payloads carried inside emoji and file frames. They are serialized with
//! bincode's standard configuration, so field order is part of the wire
//! contract and every field is always present (optional fields encode as an
//! explicit `None`).

use super::{CodecError, Recipient, DEFAULT_MAX_FRAME_LEN};
use bincode::config;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Serialize a payload for a binary frame
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(payload, config::standard()).map_err(CodecError::Encode)
}

/// Deserialize a binary frame payload; trailing bytes are rejected
///
/// Length fields inside the payload are checked against the frame ceiling
/// before anything is allocated for them.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let config = config::standard().with_limit::<DEFAULT_MAX_FRAME_LEN>();
    let (payload, consumed) =
        bincode::serde::decode_from_slice(bytes, config).map_err(CodecError::Decode)?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            consumed,
            total: bytes.len(),
        });
    }
    Ok(payload)
}

/// Payload for an emoji frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiPayload {
    /// Always "emoji"
    #[serde(rename = "type")]
    pub kind: String,
    /// Recipient username, or the broadcast keyword
    pub to: Option<String>,
    /// Raw image bytes, relayed untouched
    pub image: Vec<u8>,
    /// Sender username, injected by the relay
    pub from: Option<String>,
}

impl EmojiPayload {
    pub const KIND: &'static str = "emoji";

    /// Create an emoji addressed to `to`
    #[must_use]
    pub fn new(to: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            to: Some(to.into()),
            image,
            from: None,
        }
    }

    /// Resolve the addressee (missing `to` means everyone)
    #[must_use]
    pub fn recipient(&self) -> Recipient {
        Recipient::from_field(self.to.as_deref())
    }
}

/// Requested file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// Fetch a stored file by name
    Download,
}

/// Payload for a file frame
///
/// The same shape serves three purposes: an upload or private transfer
/// (`action` is `None`, `content` carries the bytes), a download request
/// (`action` is `Download`, `content` is empty), and a download response
/// (`content` and `save_path` filled in by the relay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// Always "file"
    #[serde(rename = "type")]
    pub kind: String,
    pub filename: String,
    pub to: Option<String>,
    pub content: Vec<u8>,
    pub action: Option<FileAction>,
    pub save_path: Option<String>,
    pub from: Option<String>,
}

impl FilePayload {
    pub const KIND: &'static str = "file";

    /// Create an upload (to everyone) or a private transfer (to one user)
    #[must_use]
    pub fn transfer(filename: impl Into<String>, to: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            filename: filename.into(),
            to: Some(to.into()),
            content,
            action: None,
            save_path: None,
            from: None,
        }
    }

    /// Create a download request
    #[must_use]
    pub fn download_request(filename: impl Into<String>, save_path: Option<String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            filename: filename.into(),
            to: None,
            content: Vec::new(),
            action: Some(FileAction::Download),
            save_path,
            from: None,
        }
    }

    /// Create the response to a download request
    #[must_use]
    pub fn download_response(filename: impl Into<String>, content: Vec<u8>, save_path: String) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            filename: filename.into(),
            to: None,
            content,
            action: None,
            save_path: Some(save_path),
            from: None,
        }
    }

    /// Whether this is a download request
    #[must_use]
    pub fn is_download(&self) -> bool {
        self.action == Some(FileAction::Download)
    }

    /// Resolve the addressee (missing `to` means everyone)
    #[must_use]
    pub fn recipient(&self) -> Recipient {
        Recipient::from_field(self.to.as_deref())
    }
}
