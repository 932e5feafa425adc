//! Connection management
//!
//! Per-client connection handles and the shared session registry.

mod connection;
mod registry;

pub use connection::{Connection, ConnectionId, Outbound, SendError};
pub use registry::{Delivery, RegistryError, SessionRegistry, DEFAULT_SEND_TIMEOUT};
