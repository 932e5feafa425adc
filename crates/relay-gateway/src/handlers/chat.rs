//! Chat message handler

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::{Recipient, ServerMessage, TextFrame};
use crate::server::RelayState;
use std::sync::Arc;

/// Handles plain text and `message` frames
pub struct ChatHandler;

impl ChatHandler {
    /// Relay text without a `type` to everyone else, byte for byte
    pub async fn relay_plain(
        state: &RelayState,
        connection: &Arc<Connection>,
        text: TextFrame,
    ) -> HandlerResult<()> {
        tracing::debug!(
            connection_id = %connection.id(),
            username = %connection.username(),
            len = text.raw().len(),
            "Relaying plain text"
        );

        state
            .dispatcher()
            .to_all_frame(text.into_raw(), Some(connection.id()))
            .await;
        Ok(())
    }

    /// Broadcast or privately deliver a chat message
    ///
    /// A private message to a user who is not connected is dropped silently.
    pub async fn message(
        state: &RelayState,
        connection: &Arc<Connection>,
        to: Option<&str>,
        content: String,
    ) -> HandlerResult<()> {
        let from = connection.username().to_string();

        match Recipient::from_field(to) {
            Recipient::All => {
                state
                    .dispatcher()
                    .to_all(&ServerMessage::Message { from, content }, Some(connection.id()))
                    .await?;
            }
            Recipient::User(name) => {
                let frame = ServerMessage::PrivateMessage { from, content }.encode()?;
                let delivered = state.dispatcher().to_user(&name, frame).await;

                tracing::debug!(
                    username = %connection.username(),
                    recipient = %name,
                    delivered,
                    "Private message"
                );
            }
        }

        Ok(())
    }
}
