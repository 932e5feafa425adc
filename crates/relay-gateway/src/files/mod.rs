//! Server file storage
//!
//! Uploaded files live flat in one directory, stored under their client-given
//! names. [`FileIndex`] caches the listing that is broadcast to clients.

mod error;
mod index;

pub use error::{StorageError, StorageResult};
pub use index::{validate_filename, FileIndex};
