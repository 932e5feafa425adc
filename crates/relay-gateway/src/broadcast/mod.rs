//! Event broadcasting
//!
//! Fan-out of relay frames to connected sessions.

mod dispatcher;

pub use dispatcher::EventDispatcher;
