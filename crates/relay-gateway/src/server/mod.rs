//! Relay server setup
//!
//! Storage bootstrap, the TCP accept loop and process-level wiring.

mod console;
mod handler;
mod state;

pub use console::{execute, run_console, run_console_from, AdminCommand, CommandError};
pub use handler::handle_connection;
pub use state::RelayState;

use crate::connection::SessionRegistry;
use crate::files::FileIndex;
use relay_common::{AppConfig, AppError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Prepare storage and create `RelayState`
///
/// Creates the storage directory if it is missing and scans it once.
pub async fn create_relay_state(config: AppConfig) -> Result<RelayState, AppError> {
    let files = FileIndex::new(config.storage.root_path());
    files.ensure_root().await.map_err(AppError::storage)?;
    let listing = files.scan().await.map_err(AppError::storage)?;

    tracing::info!(
        root = %files.root().display(),
        count = listing.len(),
        "Storage scanned"
    );

    let registry = SessionRegistry::new_shared(config.relay.send_timeout());
    Ok(RelayState::new(registry, Arc::new(files), config))
}

/// Bind the configured TCP endpoint
pub async fn bind(config: &AppConfig) -> Result<TcpListener, AppError> {
    let addr = config.server.address();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })
}

/// Accept connections until `shutdown` resolves
///
/// Every accepted socket gets its own task. Accept errors are logged and
/// retried; they never stop the loop.
pub async fn run_server<S>(listener: TcpListener, state: RelayState, shutdown: S) -> Result<(), AppError>
where
    S: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    tracing::info!("Relay listening on {}", addr);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                        }
                        tracing::debug!(peer_addr = %peer_addr, "Connection accepted");
                        tokio::spawn(handle_connection(state.clone(), stream, peer_addr));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Run the complete relay with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let listener = bind(&config).await?;
    let admin_console = config.relay.admin_console;

    let state = create_relay_state(config).await?;

    if admin_console {
        tokio::spawn(run_console(state.clone()));
    }

    run_server(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
