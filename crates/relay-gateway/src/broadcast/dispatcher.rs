//! Event dispatcher
//!
//! Sends relay frames to one, some, or all sessions and turns every failed
//! delivery into a departure that is announced to the remaining sessions.

use crate::connection::{Connection, ConnectionId, Delivery, SessionRegistry};
use crate::protocol::{CodecError, ServerMessage};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;

/// Routes encoded frames through the session registry
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    /// Session registry for sending frames
    registry: Arc<SessionRegistry>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Encode a relay message and send it to every session except `exclude`
    ///
    /// Returns the number of sessions that received it.
    pub async fn to_all(
        &self,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> Result<usize, CodecError> {
        let frame = message.encode()?;
        Ok(self.to_all_frame(frame, exclude).await)
    }

    /// Send an already encoded frame to every session except `exclude`
    pub async fn to_all_frame(&self, frame: Bytes, exclude: Option<ConnectionId>) -> usize {
        let delivery = self.registry.broadcast(&frame, exclude).await;
        self.finish(delivery).await
    }

    /// Send a frame to the first session registered as `username`
    ///
    /// Returns `false` if nobody by that name is connected or the send failed.
    pub async fn to_user(&self, username: &str, frame: Bytes) -> bool {
        let Some(connection) = self.registry.lookup_by_username(username) else {
            tracing::debug!(recipient = %username, "Recipient not connected, frame dropped");
            return false;
        };

        self.to_connection(&connection, frame).await
    }

    /// Send a frame to one specific session
    pub async fn to_connection(&self, connection: &Arc<Connection>, frame: Bytes) -> bool {
        let delivery = self.registry.unicast(connection, frame).await;
        self.finish(delivery).await == 1
    }

    /// Send the current username list to every session
    pub async fn users_list(&self) -> Result<usize, CodecError> {
        let message = ServerMessage::UsersList {
            users: self.registry.all_usernames(),
        };
        self.to_all(&message, None).await
    }

    /// Send a file listing to every session
    pub async fn files_list(&self, files: Vec<String>) -> Result<usize, CodecError> {
        self.to_all(&ServerMessage::FilesList { files }, None).await
    }

    /// Announce a session that has already been removed from the registry
    pub async fn depart(&self, connection: Arc<Connection>) {
        self.settle(vec![connection]).await;
    }

    async fn finish(&self, delivery: Delivery) -> usize {
        let delivered = delivery.delivered;
        if !delivery.departed.is_empty() {
            self.settle(delivery.departed).await;
        }
        delivered
    }

    /// Announce departures until no announcement causes another one
    ///
    /// Each departure sends the refreshed username list first, then the
    /// leave notice. Recipients dropped while announcing join the queue.
    async fn settle(&self, departed: Vec<Arc<Connection>>) {
        let mut pending: VecDeque<_> = departed.into();

        while let Some(connection) = pending.pop_front() {
            tracing::info!(
                connection_id = %connection.id(),
                username = %connection.username(),
                "User left"
            );

            let announcements = [
                ServerMessage::UsersList {
                    users: self.registry.all_usernames(),
                },
                ServerMessage::left(connection.username()),
            ];

            for message in announcements {
                match message.encode() {
                    Ok(frame) => {
                        let delivery = self.registry.broadcast(&frame, None).await;
                        pending.extend(delivery.departed);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode departure announcement");
                    }
                }
            }
        }
    }
}
