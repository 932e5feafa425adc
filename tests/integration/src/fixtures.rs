//! Test fixtures and data generators

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A username no other test uses
pub fn unique_username(prefix: &str) -> String {
    format!("{prefix}{}", unique_suffix())
}

/// A filename no other test uses
pub fn unique_filename(extension: &str) -> String {
    format!("file{}.{extension}", unique_suffix())
}

/// Deterministic binary content covering every byte value
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}
