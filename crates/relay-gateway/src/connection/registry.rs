//! Session registry
//!
//! Shared table of connected sessions in registration order. All reads take a
//! snapshot under the lock; all socket-bound work happens after the lock is
//! released.

use super::{Connection, ConnectionId};
use bytes::Bytes;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Default wait for room in a recipient's queue
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// Result of delivering one frame to one or more sessions
#[derive(Debug, Default)]
pub struct Delivery {
    /// Sessions that accepted the frame
    pub delivered: usize,
    /// Sessions removed because the frame could not be queued
    pub departed: Vec<Arc<Connection>>,
}

impl Delivery {
    /// Fold another delivery into this one
    pub fn merge(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.departed.extend(other.departed);
    }
}

/// Tracks every session that completed the handshake
pub struct SessionRegistry {
    /// Sessions in registration order
    sessions: RwLock<Vec<Arc<Connection>>>,

    /// Wait for room in a recipient queue before giving up on it
    send_timeout: Duration,
}

impl SessionRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            send_timeout,
        }
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared(send_timeout: Duration) -> Arc<Self> {
        Arc::new(Self::new(send_timeout))
    }

    /// Register a session
    pub fn add(&self, connection: Arc<Connection>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write();
        if sessions.iter().any(|c| c.id() == connection.id()) {
            return Err(RegistryError::AlreadyRegistered(connection.id()));
        }

        tracing::debug!(
            connection_id = %connection.id(),
            username = %connection.username(),
            "Session added"
        );
        sessions.push(connection);
        Ok(())
    }

    /// Remove a session; `None` if it was not registered
    ///
    /// A `Some` return obliges the caller to announce the departure.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut sessions = self.sessions.write();
        let index = sessions.iter().position(|c| c.id() == id)?;
        let connection = sessions.remove(index);

        tracing::debug!(
            connection_id = %id,
            username = %connection.username(),
            "Session removed"
        );
        Some(connection)
    }

    /// Get a session by connection ID
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.sessions.read().iter().find(|c| c.id() == id).cloned()
    }

    /// Check if a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.read().iter().any(|c| c.id() == id)
    }

    /// First session registered under `username`
    pub fn lookup_by_username(&self, username: &str) -> Option<Arc<Connection>> {
        self.sessions
            .read()
            .iter()
            .find(|c| c.username() == username)
            .cloned()
    }

    /// Usernames in registration order (a copy)
    pub fn all_usernames(&self) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .map(|c| c.username().to_string())
            .collect()
    }

    /// All sessions in registration order (a copy)
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.sessions.read().clone()
    }

    /// Get the number of sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Send a frame to one session
    pub async fn unicast(&self, connection: &Arc<Connection>, frame: Bytes) -> Delivery {
        let mut delivery = Delivery::default();
        self.deliver(connection, frame, &mut delivery).await;
        delivery
    }

    /// Send a frame to every session except `exclude`
    ///
    /// Sends go to a snapshot taken before any I/O. A recipient whose queue
    /// is closed or stays full past the send timeout is removed and closed;
    /// the others still receive the frame.
    pub async fn broadcast(&self, frame: &Bytes, exclude: Option<ConnectionId>) -> Delivery {
        let recipients: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|c| Some(c.id()) != exclude)
            .collect();

        let outcomes = join_all(recipients.iter().map(|conn| async move {
            let mut delivery = Delivery::default();
            self.deliver(conn, frame.clone(), &mut delivery).await;
            delivery
        }))
        .await;

        let mut total = Delivery::default();
        for outcome in outcomes {
            total.merge(outcome);
        }

        tracing::trace!(
            delivered = total.delivered,
            departed = total.departed.len(),
            "Frame broadcast"
        );

        total
    }

    async fn deliver(&self, connection: &Arc<Connection>, frame: Bytes, delivery: &mut Delivery) {
        match connection.send(frame, self.send_timeout).await {
            Ok(()) => delivery.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    username = %connection.username(),
                    error = %e,
                    "Dropping connection after failed send"
                );
                connection.close();
                if let Some(removed) = self.remove(connection.id()) {
                    delivery.departed.push(removed);
                }
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}
