//! Emoji and file handlers

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::files::StorageError;
use crate::protocol::{EmojiPayload, FilePayload, Frame, Recipient};
use crate::server::RelayState;
use std::sync::Arc;

/// Handles binary emoji and file frames
pub struct AttachmentHandler;

impl AttachmentHandler {
    /// Stamp the sender on an emoji and forward it
    pub async fn emoji(
        state: &RelayState,
        connection: &Arc<Connection>,
        mut payload: EmojiPayload,
    ) -> HandlerResult<()> {
        payload.from = Some(connection.username().to_string());
        let recipient = payload.recipient();
        let frame = Frame::Emoji(payload).encode()?;

        match recipient {
            Recipient::All => {
                state
                    .dispatcher()
                    .to_all_frame(frame, Some(connection.id()))
                    .await;
            }
            Recipient::User(name) => {
                state.dispatcher().to_user(&name, frame).await;
            }
        }

        tracing::debug!(username = %connection.username(), "Emoji relayed");
        Ok(())
    }

    /// Route a file frame: download, shared upload, or private transfer
    pub async fn file(
        state: &RelayState,
        connection: &Arc<Connection>,
        payload: FilePayload,
    ) -> HandlerResult<()> {
        if payload.is_download() {
            return Self::download(state, connection, payload).await;
        }

        match payload.recipient() {
            Recipient::All => Self::upload(state, connection, payload).await,
            Recipient::User(name) => Self::forward(state, connection, payload, &name).await,
        }
    }

    /// Send a stored file back to the requester
    async fn download(
        state: &RelayState,
        connection: &Arc<Connection>,
        request: FilePayload,
    ) -> HandlerResult<()> {
        let filename = request.filename;

        // Only names in the published listing are served
        let content = if state.files().lookup(&filename) {
            state.files().read(&filename).await?
        } else {
            None
        };

        let Some(content) = content else {
            tracing::warn!(
                username = %connection.username(),
                filename = %filename,
                "Requested file does not exist"
            );
            return Err(HandlerError::Storage(StorageError::NotFound(filename)));
        };

        let save_path = request.save_path.unwrap_or_else(|| filename.clone());
        let size = content.len();
        let frame = Frame::File(FilePayload::download_response(&filename, content, save_path)).encode()?;

        if state.dispatcher().to_connection(connection, frame).await {
            tracing::info!(
                username = %connection.username(),
                filename = %filename,
                size,
                "File downloaded"
            );
        }
        Ok(())
    }

    /// Persist a file shared with everyone and publish the new listing
    async fn upload(
        state: &RelayState,
        connection: &Arc<Connection>,
        payload: FilePayload,
    ) -> HandlerResult<()> {
        let listing = state
            .files()
            .store(&payload.filename, &payload.content)
            .await?;

        tracing::info!(
            username = %connection.username(),
            filename = %payload.filename,
            size = payload.content.len(),
            "File uploaded"
        );

        state.dispatcher().files_list(listing).await?;
        Ok(())
    }

    /// Hand a private file to one user without storing it
    async fn forward(
        state: &RelayState,
        connection: &Arc<Connection>,
        mut payload: FilePayload,
        recipient: &str,
    ) -> HandlerResult<()> {
        payload.from = Some(connection.username().to_string());
        let filename = payload.filename.clone();
        let frame = Frame::File(payload).encode()?;

        let delivered = state.dispatcher().to_user(recipient, frame).await;
        tracing::info!(
            username = %connection.username(),
            recipient = %recipient,
            filename = %filename,
            delivered,
            "Private file forwarded"
        );
        Ok(())
    }
}
