//! Departure handler

use crate::connection::ConnectionId;
use crate::server::RelayState;

/// Handles sessions leaving the relay
pub struct PresenceHandler;

impl PresenceHandler {
    /// Remove a session, close it, and announce the departure
    ///
    /// Safe to call more than once; only the first call announces anything.
    pub async fn leave(state: &RelayState, id: ConnectionId) -> bool {
        let Some(connection) = state.registry().remove(id) else {
            return false;
        };

        connection.close();
        state.dispatcher().depart(connection).await;
        true
    }
}
