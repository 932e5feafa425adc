//! Operator actions
//!
//! Kicking users and managing stored files, driven from the admin console.

use super::{HandlerResult, PresenceHandler};
use crate::connection::ConnectionId;
use crate::protocol::ServerMessage;
use crate::server::RelayState;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

/// One connected session as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: ConnectionId,
    pub username: String,
    pub peer_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

/// Handles operator commands
pub struct AdminHandler;

impl AdminHandler {
    /// Force the first session named `username` off the relay
    ///
    /// The client receives the forced-logout notice before its socket is
    /// closed. Returns `false` if nobody by that name is connected.
    pub async fn kick(state: &RelayState, username: &str) -> bool {
        let Some(connection) = state.registry().lookup_by_username(username) else {
            tracing::warn!(username = %username, "Kick failed: user not connected");
            return false;
        };

        match ServerMessage::forced_logout().encode() {
            Ok(frame) => {
                state.dispatcher().to_connection(&connection, frame).await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode forced logout notice"),
        }

        connection.close();
        PresenceHandler::leave(state, connection.id()).await;

        tracing::info!(
            connection_id = %connection.id(),
            username = %username,
            "User kicked"
        );
        true
    }

    /// Delete a stored file and publish the new listing to everyone
    pub async fn delete_file(state: &RelayState, filename: &str) -> HandlerResult<Vec<String>> {
        let listing = state.files().delete(filename).await?;
        tracing::info!(filename = %filename, "File deleted");

        state.dispatcher().files_list(listing.clone()).await?;
        Ok(listing)
    }

    /// Connected sessions in registration order
    pub fn users(state: &RelayState) -> Vec<SessionSummary> {
        state
            .registry()
            .snapshot()
            .into_iter()
            .map(|c| SessionSummary {
                id: c.id(),
                username: c.username().to_string(),
                peer_addr: c.peer_addr(),
                connected_at: c.connected_at(),
            })
            .collect()
    }

    /// Cached storage listing
    pub fn files(state: &RelayState) -> Vec<String> {
        state.files().listing()
    }
}
