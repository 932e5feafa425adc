//! Game relay handler
//!
//! The relay keeps no game state. Invites, answers and moves are forwarded
//! to the named opponent with the sender stamped in `from`.

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::{GameAction, GameMove, ServerMessage};
use crate::server::RelayState;
use std::sync::Arc;

/// Handles `game_invite`, `game_invite_response` and `game_move`
pub struct GameHandler;

impl GameHandler {
    /// Forward a game invite
    pub async fn invite(state: &RelayState, connection: &Arc<Connection>, to: String) -> HandlerResult<()> {
        let from = connection.username().to_string();
        let frame = ServerMessage::GameInvite {
            from: from.clone(),
            to: to.clone(),
        }
        .encode()?;

        if state.dispatcher().to_user(&to, frame).await {
            tracing::info!(from = %from, to = %to, "Game invite sent");
        }
        Ok(())
    }

    /// Forward the answer to an invite
    pub async fn respond(
        state: &RelayState,
        connection: &Arc<Connection>,
        to: String,
        accepted: bool,
    ) -> HandlerResult<()> {
        let from = connection.username().to_string();
        let frame = ServerMessage::GameInviteResponse {
            from: from.clone(),
            to: to.clone(),
            accepted,
        }
        .encode()?;

        if state.dispatcher().to_user(&to, frame).await {
            tracing::info!(from = %from, to = %to, accepted, "Game invite answered");
        }
        Ok(())
    }

    /// Forward a move, result or draw negotiation
    pub async fn relay_move(
        state: &RelayState,
        connection: &Arc<Connection>,
        mut body: GameMove,
    ) -> HandlerResult<()> {
        // The relay's `from` is authoritative
        body.extra.remove("from");

        let to = body.to.clone();
        let action = body.action;
        let accepted = body.accepted;
        let from = connection.username().to_string();
        let frame = ServerMessage::GameMove {
            from: from.clone(),
            body,
        }
        .encode()?;

        if state.dispatcher().to_user(&to, frame).await {
            Self::log_action(&from, &to, action, accepted);
        }
        Ok(())
    }

    fn log_action(from: &str, to: &str, action: GameAction, accepted: Option<bool>) {
        match action {
            GameAction::Move => tracing::debug!(from = %from, to = %to, "Game move"),
            GameAction::Win => tracing::info!(winner = %from, opponent = %to, "Game over: win"),
            GameAction::Surrender => {
                tracing::info!(loser = %from, opponent = %to, "Game over: surrender");
            }
            GameAction::DrawRequest => tracing::info!(from = %from, to = %to, "Draw requested"),
            GameAction::DrawResponse => {
                tracing::info!(from = %from, to = %to, accepted = ?accepted, "Draw answered");
            }
        }
    }
}
