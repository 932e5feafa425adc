//! Connection handler
//!
//! Owns one accepted socket: reads the username handshake, registers the
//! session, then runs the read/dispatch loop next to the single writer that
//! owns the socket's write half.

use crate::connection::{Connection, ConnectionId, Outbound};
use crate::handlers::{HandlerError, IdentifyHandler, MessageDispatcher, PresenceHandler};
use crate::protocol::{write_encoded, FrameReader};
use crate::server::RelayState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Serve one client until it disconnects or is removed
pub async fn handle_connection(state: RelayState, stream: TcpStream, peer_addr: SocketAddr) {
    let (read_half, write_half) = stream.into_split();
    let mut reader =
        FrameReader::new(read_half).with_max_frame_len(state.config().storage.max_frame_bytes());

    let username = match reader.read_handshake().await {
        Ok(Some(username)) => username,
        Ok(None) => {
            tracing::debug!(peer_addr = %peer_addr, "Connection closed before handshake");
            return;
        }
        Err(e) => {
            tracing::warn!(peer_addr = %peer_addr, error = %e, "Handshake failed");
            return;
        }
    };

    let relay = &state.config().relay;
    let (tx, rx) = mpsc::channel(relay.outbound_buffer.max(1));
    let connection = Connection::new(username, peer_addr, tx);

    tracing::info!(
        connection_id = %connection.id(),
        username = %connection.username(),
        peer_addr = %peer_addr,
        "Client connected"
    );

    let writer = write_loop(write_half, rx, relay.write_timeout(), connection.id());
    let session = async {
        if let Err(e) = IdentifyHandler::handle(&state, &connection).await {
            tracing::warn!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to register session"
            );
            return;
        }
        read_loop(&state, &connection, &mut reader).await;
    };

    tokio::select! {
        () = session => {
            tracing::debug!(connection_id = %connection.id(), "Read loop ended");
        }
        () = writer => {
            tracing::debug!(connection_id = %connection.id(), "Writer stopped");
        }
        () = connection.shutdown_requested() => {
            tracing::debug!(connection_id = %connection.id(), "Shutdown requested");
        }
    }

    PresenceHandler::leave(&state, connection.id()).await;

    tracing::info!(
        connection_id = %connection.id(),
        username = %connection.username(),
        "Client disconnected"
    );
}

/// Decode frames and hand them to the dispatcher until the stream ends
async fn read_loop<R: AsyncRead + Unpin>(
    state: &RelayState,
    connection: &Arc<Connection>,
    reader: &mut FrameReader<R>,
) {
    loop {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(connection_id = %connection.id(), "Client closed the stream");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    username = %connection.username(),
                    error = %e,
                    "Dropping connection after decode error"
                );
                return;
            }
        };

        if let Err(e) = MessageDispatcher::dispatch(state, connection, frame).await {
            if e.is_fatal() {
                tracing::warn!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Handler error"
                );
                return;
            }
            report(state, connection, &e).await;
        }
    }
}

/// Tell the sender why its frame was not routed
async fn report(state: &RelayState, connection: &Arc<Connection>, error: &HandlerError) {
    tracing::debug!(
        connection_id = %connection.id(),
        username = %connection.username(),
        error = %error,
        "Frame rejected"
    );

    let Some(notice) = error.to_notice() else {
        return;
    };
    match notice.encode() {
        Ok(frame) => {
            state.dispatcher().to_connection(connection, frame).await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode notice"),
    }
}

/// Drain the outbound queue onto the socket, one whole frame at a time
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
    connection_id: ConnectionId,
) {
    while let Some(item) = rx.recv().await {
        let frame = match item {
            Outbound::Frame(frame) => frame,
            Outbound::Close => break,
        };

        match tokio::time::timeout(write_timeout, write_encoded(&mut writer, &frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Write failed");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    timeout_ms = write_timeout.as_millis(),
                    "Write timed out"
                );
                return;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(connection_id = %connection_id, error = %e, "Shutdown after close failed");
    }
}
