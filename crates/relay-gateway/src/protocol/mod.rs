//! Wire protocol definitions
//!
//! Frame markers, the frame codec, JSON message shapes and binary payloads.

mod codec;
mod markers;
mod messages;
mod payloads;

pub use codec::{
    encode_binary, write_encoded, write_frame, CodecError, Frame, FrameReader, TextFrame,
    BINARY_HEADER_LEN, DEFAULT_MAX_FRAME_LEN, HANDSHAKE_READ_LIMIT, IO_CHUNK_SIZE,
    TEXT_READ_LIMIT,
};
pub use markers::FrameMarker;
pub use messages::{
    ClientMessage, GameAction, GameMove, Recipient, ServerMessage, ALL_RECIPIENTS,
    ALL_RECIPIENTS_ALIAS, FORCED_LOGOUT,
};
pub use payloads::{decode_payload, encode_payload, EmojiPayload, FileAction, FilePayload};
