//! Frame handlers
//!
//! Interprets decoded frames and performs their routing and side effects.

mod admin;
mod attachment;
mod chat;
mod error;
mod game;
mod identify;
mod presence;

pub use admin::{AdminHandler, SessionSummary};
pub use attachment::AttachmentHandler;
pub use chat::ChatHandler;
pub use error::{HandlerError, HandlerResult};
pub use game::GameHandler;
pub use identify::IdentifyHandler;
pub use presence::PresenceHandler;

use crate::connection::Connection;
use crate::protocol::{ClientMessage, Frame, TextFrame};
use crate::server::RelayState;
use serde::Deserialize;
use std::sync::Arc;

/// Dispatch incoming client frames to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one frame from a registered connection
    pub async fn dispatch(
        state: &RelayState,
        connection: &Arc<Connection>,
        frame: Frame,
    ) -> HandlerResult<()> {
        tracing::trace!(
            connection_id = %connection.id(),
            kind = frame.kind(),
            "Received frame"
        );

        match frame {
            Frame::Text(text) => Self::dispatch_text(state, connection, text).await,
            Frame::Emoji(payload) => AttachmentHandler::emoji(state, connection, payload).await,
            Frame::File(payload) => AttachmentHandler::file(state, connection, payload).await,
        }
    }

    async fn dispatch_text(
        state: &RelayState,
        connection: &Arc<Connection>,
        text: TextFrame,
    ) -> HandlerResult<()> {
        let Some(value) = text.json().filter(|v| v.get("type").is_some()) else {
            return ChatHandler::relay_plain(state, connection, text).await;
        };

        let message = ClientMessage::deserialize(value).map_err(|e| {
            let kind = text.message_type().unwrap_or("<non-string>");
            HandlerError::UnsupportedMessage(format!("{kind}: {e}"))
        })?;

        match message {
            ClientMessage::Message { to, content } => {
                ChatHandler::message(state, connection, to.as_deref(), content).await
            }
            ClientMessage::GameInvite { to } => GameHandler::invite(state, connection, to).await,
            ClientMessage::GameInviteResponse { to, accepted } => {
                GameHandler::respond(state, connection, to, accepted).await
            }
            ClientMessage::GameMove(body) => GameHandler::relay_move(state, connection, body).await,
        }
    }
}
