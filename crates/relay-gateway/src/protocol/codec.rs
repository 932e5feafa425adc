//! Frame codec
//!
//! Reads and writes the two-mode wire format:
//!
//! ```text
//! binary: [marker 0x01|0x02] [u32 big-endian length] [bincode payload]
//! text:   raw UTF-8 JSON (or plain text), no length prefix
//! ```
//!
//! Text frames have no delimiter, so the reader takes whatever one read call
//! returns (capped at [`TEXT_READ_LIMIT`]) and splits out complete JSON objects.
//! Bytes that do not start a JSON object are treated as a plain-text message
//! running up to the next reserved marker byte.

use super::{decode_payload, encode_payload, EmojiPayload, FilePayload, FrameMarker};
use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes taken by one text read, including the marker byte
pub const TEXT_READ_LIMIT: usize = 8192;

/// Bytes taken by the username handshake read
pub const HANDSHAKE_READ_LIMIT: usize = 1024;

/// Size of the marker plus length header of a binary frame
pub const BINARY_HEADER_LEN: usize = 5;

/// Chunk size for socket reads and writes of large frames
pub const IO_CHUNK_SIZE: usize = 8 * 1024;

/// Default and largest accepted binary payload
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated frame: expected {expected} bytes, stream ended after {received}")]
    Truncated { expected: usize, received: usize },

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Payload decode error: {0}")]
    Decode(#[source] bincode::error::DecodeError),

    #[error("Payload encode error: {0}")]
    Encode(#[source] bincode::error::EncodeError),

    #[error("Payload has {total} bytes but only {consumed} were decoded")]
    TrailingBytes { consumed: usize, total: usize },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A text frame: the raw bytes as received plus their JSON value, if any
#[derive(Debug, Clone, PartialEq)]
pub struct TextFrame {
    raw: Bytes,
    value: Option<Value>,
}

impl TextFrame {
    /// Serialize a value as a JSON text frame
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        let raw = Bytes::from(serde_json::to_vec(value)?);
        let value = serde_json::from_slice(&raw).ok();
        Ok(Self { raw, value })
    }

    /// A plain-text frame
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            raw: Bytes::from(text.into()),
            value: None,
        }
    }

    /// Bytes exactly as they travel on the wire
    #[must_use]
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    #[must_use]
    pub fn into_raw(self) -> Bytes {
        self.raw
    }

    /// Parsed JSON object, `None` for plain text
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The `type` key of a JSON object
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        self.value.as_ref()?.get("type")?.as_str()
    }

    /// Text content, lossily decoded for logs and plain messages
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

/// One decoded unit of the wire protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(TextFrame),
    Emoji(EmojiPayload),
    File(FilePayload),
}

impl Frame {
    /// Encode to the exact bytes written on the wire
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        match self {
            Self::Text(text) => Ok(text.raw.clone()),
            Self::Emoji(payload) => encode_binary(FrameMarker::Emoji, &encode_payload(payload)?),
            Self::File(payload) => encode_binary(FrameMarker::File, &encode_payload(payload)?),
        }
    }

    /// Short label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Emoji(_) => FrameMarker::Emoji.name(),
            Self::File(_) => FrameMarker::File.name(),
        }
    }
}

/// Prefix a serialized payload with its marker and big-endian length
pub fn encode_binary(marker: FrameMarker, payload: &[u8]) -> Result<Bytes, CodecError> {
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(BINARY_HEADER_LEN + payload.len());
    buf.extend_from_slice(&[marker.as_byte()]);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

/// Write an encoded frame in bounded chunks and flush it
///
/// Callers must not start another frame on the same writer until this returns.
pub async fn write_encoded<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    for chunk in frame.chunks(IO_CHUNK_SIZE) {
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}

/// Encode and write one frame
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<(), CodecError> {
    let bytes = frame.encode()?;
    write_encoded(writer, &bytes).await?;
    Ok(())
}

/// Buffered frame reader over one stream
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buffer: BytesMut,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default payload cap
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(TEXT_READ_LIMIT),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Set the largest binary payload accepted, at most [`DEFAULT_MAX_FRAME_LEN`]
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.min(DEFAULT_MAX_FRAME_LEN);
        self
    }

    /// Read the raw username sent as the first bytes of a connection
    ///
    /// Returns `None` if the peer closed or sent only whitespace.
    pub async fn read_handshake(&mut self) -> Result<Option<String>, CodecError> {
        if self.buffer.is_empty() && self.fill(HANDSHAKE_READ_LIMIT).await? == 0 {
            return Ok(None);
        }

        let take = self.buffer.len().min(HANDSHAKE_READ_LIMIT);
        let raw = self.buffer.split_to(take);
        let username = String::from_utf8_lossy(&raw).trim().to_string();

        Ok((!username.is_empty()).then_some(username))
    }

    /// Read the next frame; `None` on a clean end of stream
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        if self.buffer.is_empty() && self.fill(1).await? == 0 {
            return Ok(None);
        }

        match FrameMarker::from_byte(self.buffer[0]) {
            Some(marker) => self.read_binary(marker).await.map(Some),
            None => self.read_text().await,
        }
    }

    async fn read_binary(&mut self, marker: FrameMarker) -> Result<Frame, CodecError> {
        self.fill_exact(BINARY_HEADER_LEN).await?;

        let len = u32::from_be_bytes([self.buffer[1], self.buffer[2], self.buffer[3], self.buffer[4]])
            as usize;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        self.fill_exact(BINARY_HEADER_LEN + len).await?;
        self.buffer.advance(BINARY_HEADER_LEN);
        let payload = self.buffer.split_to(len);

        match marker {
            FrameMarker::Emoji => Ok(Frame::Emoji(decode_payload(&payload)?)),
            FrameMarker::File => Ok(Frame::File(decode_payload(&payload)?)),
        }
    }

    async fn read_text(&mut self) -> Result<Option<Frame>, CodecError> {
        // A lone leading byte gets one more read, the same single read a
        // client expects the server to make for its message.
        if self.buffer.len() == 1 && self.fill(TEXT_READ_LIMIT - 1).await? == 0 {
            self.buffer.clear();
            return Ok(None);
        }

        let end = self
            .buffer
            .iter()
            .skip(1)
            .position(|b| FrameMarker::is_reserved(*b))
            .map_or(self.buffer.len(), |pos| pos + 1)
            .min(TEXT_READ_LIMIT);

        let mut values = serde_json::Deserializer::from_slice(&self.buffer[..end]).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            if value.is_object() {
                let consumed = values.byte_offset();
                let raw = self.buffer.split_to(consumed).freeze();
                self.skip_whitespace();
                return Ok(Some(Frame::Text(TextFrame {
                    raw: trim_start(raw),
                    value: Some(value),
                })));
            }
        }

        let raw = self.buffer.split_to(end).freeze();
        Ok(Some(Frame::Text(TextFrame { raw, value: None })))
    }

    fn skip_whitespace(&mut self) {
        let ws = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.advance(ws);
    }

    /// One read call of at most `limit` bytes into the buffer
    async fn fill(&mut self, limit: usize) -> std::io::Result<usize> {
        let mut chunk = vec![0u8; limit.min(TEXT_READ_LIMIT)];
        let n = self.inner.read(&mut chunk).await?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Read until at least `needed` bytes are buffered
    async fn fill_exact(&mut self, needed: usize) -> Result<(), CodecError> {
        self.buffer.reserve(needed.saturating_sub(self.buffer.len()));
        while self.buffer.len() < needed {
            let want = (needed - self.buffer.len()).min(IO_CHUNK_SIZE);
            if self.fill(want).await? == 0 {
                return Err(CodecError::Truncated {
                    expected: needed,
                    received: self.buffer.len(),
                });
            }
        }
        Ok(())
    }
}

fn trim_start(raw: Bytes) -> Bytes {
    let ws = raw.iter().take_while(|b| b.is_ascii_whitespace()).count();
    raw.slice(ws..)
}
