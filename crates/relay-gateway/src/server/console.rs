//! Admin console
//!
//! Line-based operator commands read from stdin while the relay runs.

use crate::handlers::AdminHandler;
use crate::server::RelayState;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

const HELP: &str = "commands: kick <username> | delete <filename> | users | files | help";

/// One operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Kick(String),
    Delete(String),
    Users,
    Files,
    Help,
}

/// Console input that is not a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
}

impl FromStr for AdminCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let argument = rest.trim();

        let required = |name: &'static str| {
            if argument.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(argument.to_string())
            }
        };

        match verb.to_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "kick" => required("kick").map(Self::Kick),
            "delete" | "rm" => required("delete").map(Self::Delete),
            "users" | "who" => Ok(Self::Users),
            "files" | "ls" => Ok(Self::Files),
            "help" | "?" => Ok(Self::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Read commands from stdin until it closes
pub async fn run_console(state: RelayState) {
    run_console_from(state, tokio::io::stdin()).await;
}

/// Read commands from `input` until it closes
pub async fn run_console_from<R: AsyncRead + Unpin>(state: RelayState, input: R) {
    let mut lines = BufReader::new(input).lines();
    tracing::info!("Admin console ready ({HELP})");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Admin console input failed");
                break;
            }
        };

        match line.parse::<AdminCommand>() {
            Ok(command) => execute(&state, command).await,
            Err(CommandError::Empty) => {}
            Err(e) => println!("{e}; {HELP}"),
        }
    }

    tracing::debug!("Admin console closed");
}

/// Run one command and print its outcome
pub async fn execute(state: &RelayState, command: AdminCommand) {
    match command {
        AdminCommand::Kick(username) => {
            if !AdminHandler::kick(state, &username).await {
                println!("no connected user named {username}");
            }
        }
        AdminCommand::Delete(filename) => {
            if let Err(e) = AdminHandler::delete_file(state, &filename).await {
                tracing::warn!(filename = %filename, error = %e, "File delete failed");
                println!("delete failed: {e}");
            }
        }
        AdminCommand::Users => {
            let users = AdminHandler::users(state);
            println!("{} online", users.len());
            for user in users {
                println!(
                    "  {}  {}  {}  since {}",
                    user.username,
                    user.peer_addr,
                    user.id,
                    user.connected_at.format("%H:%M:%S")
                );
            }
        }
        AdminCommand::Files => {
            let files = AdminHandler::files(state);
            println!("{} files", files.len());
            for file in files {
                println!("  {file}");
            }
        }
        AdminCommand::Help => println!("{HELP}"),
    }
}
