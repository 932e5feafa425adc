//! Relay state
//!
//! Shared dependencies handed to every connection task.

use crate::broadcast::EventDispatcher;
use crate::connection::SessionRegistry;
use crate::files::FileIndex;
use relay_common::AppConfig;
use std::sync::Arc;

/// Relay application state
///
/// Cheap to clone; every clone refers to the same registry and file index.
#[derive(Clone)]
pub struct RelayState {
    /// Connected sessions
    registry: Arc<SessionRegistry>,
    /// Fan-out over the registry
    dispatcher: EventDispatcher,
    /// Cached storage listing
    files: Arc<FileIndex>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl RelayState {
    /// Create a new relay state
    pub fn new(registry: Arc<SessionRegistry>, files: Arc<FileIndex>, config: AppConfig) -> Self {
        Self {
            dispatcher: EventDispatcher::new(registry.clone()),
            registry,
            files,
            config: Arc::new(config),
        }
    }

    /// Get the session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Get the event dispatcher
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Get the file index
    pub fn files(&self) -> &FileIndex {
        &self.files
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("registry", &self.registry)
            .field("storage", &self.files.root())
            .finish()
    }
}
