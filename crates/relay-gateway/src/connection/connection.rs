//! Individual client connection
//!
//! A `Connection` is the shareable handle to one client: its identity, its
//! username, and the queue feeding the task that owns the socket's write half.
//! The socket itself is never shared.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Opaque, unique identity of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new connection ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Item consumed by a connection's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A fully encoded frame, written whole
    Frame(Bytes),
    /// Shut the write half down after everything queued before it
    Close,
}

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection writer has stopped")]
    Closed,
    #[error("connection queue stayed full past the send timeout")]
    TimedOut,
}

/// A registered client connection
pub struct Connection {
    /// Unique connection ID
    id: ConnectionId,

    /// Username sent in the handshake (not unique)
    username: String,

    /// Remote address
    peer_addr: SocketAddr,

    /// Queue to the writer task
    sender: mpsc::Sender<Outbound>,

    /// Set once the connection has been told to close
    closing: AtomicBool,

    /// Wakes the connection handler when the queue cannot carry a close
    shutdown: Notify,

    /// Handshake completion time
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new connection handle
    pub fn new(username: String, peer_addr: SocketAddr, sender: mpsc::Sender<Outbound>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::generate(),
            username,
            peer_addr,
            sender,
            closing: AtomicBool::new(false),
            shutdown: Notify::new(),
            connected_at: Utc::now(),
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the remote address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the handshake time
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue an encoded frame, waiting at most `timeout` for room
    pub async fn send(&self, frame: Bytes, timeout: Duration) -> Result<(), SendError> {
        if self.is_closing() {
            return Err(SendError::Closed);
        }

        self.sender
            .send_timeout(Outbound::Frame(frame), timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SendError::TimedOut,
                SendTimeoutError::Closed(_) => SendError::Closed,
            })
    }

    /// Ask the connection to close
    ///
    /// Frames queued earlier are still written. If the queue is full or the
    /// writer is gone, the handler is woken directly instead.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.sender.try_send(Outbound::Close) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => self.shutdown.notify_one(),
        }
    }

    /// Whether `close` has been called
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Resolves when the connection must be torn down without draining its queue
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    /// Check if the writer task has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("peer_addr", &self.peer_addr)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
