//! JSON message format
//!
//! Every text frame that carries a `type` key decodes into [`ClientMessage`];
//! everything the relay writes as text is a [`ServerMessage`]. Field names are
//! the stable wire contract shared with clients.

use super::{CodecError, TextFrame};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword addressing every connected user
pub const ALL_RECIPIENTS: &str = "所有人";

/// Alternate spelling accepted for [`ALL_RECIPIENTS`]
pub const ALL_RECIPIENTS_ALIAS: &str = "ALL";

/// Notice content a kicked client receives; clients match on it exactly
pub const FORCED_LOGOUT: &str = "您已被服务器强制下线";

/// Addressee of a chat message or attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Everyone except the sender
    All,
    /// The first session registered under this username
    User(String),
}

impl Recipient {
    /// Interpret a `to` field; absent means everyone
    #[must_use]
    pub fn from_field(to: Option<&str>) -> Self {
        match to {
            None | Some(ALL_RECIPIENTS | ALL_RECIPIENTS_ALIAS) => Self::All,
            Some(name) => Self::User(name.to_string()),
        }
    }
}

/// Action carried by a `game_move`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    Move,
    Win,
    Surrender,
    DrawRequest,
    DrawResponse,
}

/// Body of a `game_move`, relayed without interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMove {
    pub to: String,
    pub action: GameAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    /// Any other fields the client attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Messages a client may send as JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat message, broadcast or private depending on `to`
    Message {
        #[serde(default)]
        to: Option<String>,
        content: String,
    },
    /// Invite `to` to a game
    GameInvite { to: String },
    /// Answer to an invite from `to`
    GameInviteResponse { to: String, accepted: bool },
    /// Move, result or draw negotiation in a running game
    GameMove(GameMove),
}

impl ClientMessage {
    /// Wire name of this message's `type`
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::GameInvite { .. } => "game_invite",
            Self::GameInviteResponse { .. } => "game_invite_response",
            Self::GameMove(_) => "game_move",
        }
    }
}

/// Messages the relay writes as JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Chat message broadcast to everyone
    Message { from: String, content: String },
    /// Chat message addressed to one user
    PrivateMessage { from: String, content: String },
    /// Current usernames, in registration order
    UsersList { users: Vec<String> },
    /// Current stored filenames
    FilesList { files: Vec<String> },
    /// Notice from the relay itself
    ServerMessage { content: String },
    GameInvite { from: String, to: String },
    GameInviteResponse {
        from: String,
        to: String,
        accepted: bool,
    },
    GameMove {
        from: String,
        #[serde(flatten)]
        body: GameMove,
    },
}

impl ServerMessage {
    /// Create a relay notice
    #[must_use]
    pub fn notice(content: impl Into<String>) -> Self {
        Self::ServerMessage {
            content: content.into(),
        }
    }

    /// Announce that `username` joined
    #[must_use]
    pub fn joined(username: &str) -> Self {
        Self::notice(format!("SERVER: {username} 加入了聊天室"))
    }

    /// Announce that `username` left
    #[must_use]
    pub fn left(username: &str) -> Self {
        Self::notice(format!("SERVER: {username} 已离开聊天室"))
    }

    /// Notice sent to a client right before it is kicked
    #[must_use]
    pub fn forced_logout() -> Self {
        Self::notice(FORCED_LOGOUT)
    }

    /// Encode as a ready-to-write text frame
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(TextFrame::from_json(self)?.into_raw())
    }
}
