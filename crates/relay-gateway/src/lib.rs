//! # relay-gateway
//!
//! TCP relay server: one persistent connection per client carrying chat text,
//! presence updates, emoji and file attachments, and paired game moves.
//!
//! Frames on the wire are either raw JSON text or a marker byte followed by a
//! big-endian length and a bincode payload (see [`protocol`]).

pub mod broadcast;
pub mod connection;
pub mod files;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{create_relay_state, run, run_server, RelayState};
