//! Join handler
//!
//! Runs once per connection, right after the username handshake.

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::ServerMessage;
use crate::server::RelayState;
use std::sync::Arc;

/// Handles a newly identified connection
pub struct IdentifyHandler;

impl IdentifyHandler {
    /// Register the session and announce it
    ///
    /// Order: username list to the newcomer only, join notice to everyone,
    /// username list to everyone, file listing to everyone.
    pub async fn handle(state: &RelayState, connection: &Arc<Connection>) -> HandlerResult<()> {
        state.registry().add(connection.clone())?;

        tracing::info!(
            connection_id = %connection.id(),
            username = %connection.username(),
            peer_addr = %connection.peer_addr(),
            "User joined"
        );

        let users = ServerMessage::UsersList {
            users: state.registry().all_usernames(),
        }
        .encode()?;
        state.dispatcher().to_connection(connection, users).await;

        let dispatcher = state.dispatcher();
        dispatcher
            .to_all(&ServerMessage::joined(connection.username()), None)
            .await?;
        dispatcher.users_list().await?;
        dispatcher.files_list(state.files().listing()).await?;

        Ok(())
    }
}
