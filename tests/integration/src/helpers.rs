//! Test helpers for integration tests
//!
//! Provides a relay bound to `127.0.0.1:0` with its own storage directory,
//! and a TCP client that speaks the relay's wire protocol.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use relay_common::AppConfig;
use relay_gateway::protocol::{write_encoded, Frame, FrameReader};
use relay_gateway::{create_relay_state, run_server, RelayState};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long a client waits for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a client listens before concluding nothing is coming
pub const SILENCE: Duration = Duration::from_millis(300);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: RelayState,
    storage: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a relay with an empty storage directory
    pub async fn start() -> Result<Self> {
        let storage = std::env::temp_dir().join(format!("relay_it_{}", uuid::Uuid::new_v4()));
        Self::start_with_config(test_config(&storage)).await
    }

    /// Start a relay with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let storage = config.storage.root_path();
        let state = create_relay_state(config).await?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            run_server(listener, server_state, shutdown).await.ok();
        });

        Ok(Self {
            addr,
            state,
            storage,
            shutdown: Some(tx),
            _handle: handle,
        })
    }

    /// Storage directory of this server
    pub fn storage(&self) -> &Path {
        &self.storage
    }

    /// Connect and complete the handshake as `username`
    pub async fn connect(&self, username: &str) -> Result<TestClient> {
        TestClient::connect(self.addr, username).await
    }

    /// Wait until the registry holds exactly `expected` usernames
    pub async fn wait_for_users(&self, expected: &[&str]) -> Result<()> {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let users = self.state.registry().all_usernames();
            if users == expected {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                bail!("expected users {expected:?}, registry has {users:?}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = std::fs::remove_dir_all(&self.storage);
    }
}

/// Create a test configuration rooted at `storage`
pub fn test_config(storage: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.root_dir = storage.to_string_lossy().into_owned();
    config.relay.admin_console = false;
    config.relay.send_timeout_ms = 500;
    config.relay.write_timeout_ms = 1_000;
    config
}

/// A connected relay client
pub struct TestClient {
    pub username: String,
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect, send the username, and consume the join sequence
    ///
    /// Returns once the relay's file listing (the last join frame) arrives,
    /// so the next bytes sent are never mistaken for the handshake.
    pub async fn connect(addr: SocketAddr, username: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, mut writer) = stream.into_split();
        writer.write_all(username.as_bytes()).await?;

        let mut client = Self {
            username: username.to_string(),
            reader: FrameReader::new(read_half),
            writer,
        };
        client.recv_json_type("files_list").await?;
        Ok(client)
    }

    /// Send a JSON text frame
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.send_raw(&serde_json::to_vec(value)?).await
    }

    /// Send any frame
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.send_raw(&bytes).await
    }

    /// Send raw bytes
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        write_encoded(&mut self.writer, bytes).await?;
        Ok(())
    }

    /// Next frame, or `None` when the relay closed the connection
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame())
            .await
            .context("timed out waiting for a frame")?
            .map_err(Into::into)
    }

    /// Skip frames until one satisfies `pred`
    pub async fn recv_until(&mut self, mut pred: impl FnMut(&Frame) -> bool) -> Result<Frame> {
        loop {
            match self.recv().await? {
                Some(frame) if pred(&frame) => return Ok(frame),
                Some(_) => {}
                None => bail!("{}: connection closed while waiting", self.username),
            }
        }
    }

    /// Skip frames until a JSON object with `type == kind` arrives
    pub async fn recv_json_type(&mut self, kind: &str) -> Result<Value> {
        let frame = self
            .recv_until(|f| matches!(f, Frame::Text(t) if t.message_type() == Some(kind)))
            .await?;
        match frame {
            Frame::Text(text) => text.json().cloned().context("text frame without JSON"),
            other => bail!("expected a text frame, got {other:?}"),
        }
    }

    /// Skip frames until a `server_message` with exactly `content` arrives
    pub async fn recv_notice(&mut self, content: &str) -> Result<Value> {
        loop {
            let notice = self.recv_json_type("server_message").await?;
            if notice["content"] == content {
                return Ok(notice);
            }
        }
    }

    /// Consume the frames another user's join sends to this client
    ///
    /// Reads through the join notice for `username` and the file listing
    /// that ends the sequence, so later reads see only newer frames.
    pub async fn settle_join(&mut self, username: &str) -> Result<()> {
        self.recv_notice(&format!("SERVER: {username} 加入了聊天室"))
            .await?;
        self.recv_json_type("files_list").await?;
        Ok(())
    }

    /// Assert that no frame satisfying `pred` arrives within [`SILENCE`]
    pub async fn expect_none(&mut self, mut pred: impl FnMut(&Frame) -> bool) -> Result<()> {
        let deadline = tokio::time::Instant::now() + SILENCE;
        loop {
            match tokio::time::timeout_at(deadline, self.reader.read_frame()).await {
                Err(_) => return Ok(()),
                Ok(Ok(Some(frame))) if pred(&frame) => {
                    bail!("{}: unexpected frame {frame:?}", self.username)
                }
                Ok(Ok(Some(_))) => {}
                Ok(Ok(None)) => return Ok(()),
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Assert that nothing at all arrives within [`SILENCE`]
    pub async fn expect_silence(&mut self) -> Result<()> {
        self.expect_none(|_| true).await
    }

    /// Wait until the relay closes this connection
    pub async fn expect_closed(&mut self) -> Result<()> {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame()).await {
                Err(_) => bail!("{}: connection still open", self.username),
                Ok(Ok(None) | Err(_)) => return Ok(()),
                Ok(Ok(Some(_))) => {}
            }
        }
    }

    /// Close the write side, as a client quitting would
    pub async fn disconnect(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
