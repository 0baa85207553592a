//! Command dispatcher
//!
//! Per-command lifecycle: ack, mark running, execute, send the terminal
//! result. Exactly one result is sent per admitted command; a result that
//! fails to send is logged and abandoned — the control plane re-offers work
//! that never reaches a terminal state.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::handlers;
use crate::models::command::{Command, CommandKind, CommandResult};

/// Execute one admitted command to its terminal state
pub async fn execute(state: &Arc<AppState>, command: Command) {
    let result = run_command(state, &command).await;

    if result.success {
        state.tracker.clear_error();
        info!("Command {} completed", command.id);
    } else {
        if let Some(error) = &result.error {
            state.tracker.record_error(error.clone());
        }
        warn!(
            "Command {} failed: {}",
            command.id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Err(e) = state.client.send_result(&command.id, &result).await {
        error!("Failed to send result for command {}: {}", command.id, e);
    }
}

async fn run_command(state: &Arc<AppState>, command: &Command) -> CommandResult {
    let Some(kind) = CommandKind::parse(&command.kind) else {
        let error = AgentError::UnknownKind(command.kind.clone());
        return CommandResult::fail(error.to_string());
    };

    if let Err(e) = state.client.ack_command(&command.id).await {
        warn!("Failed to ack command {}: {}", command.id, e);
    }
    if let Err(e) = state.client.mark_running(&command.id).await {
        warn!("Failed to mark command {} running: {}", command.id, e);
    }

    info!("Executing command {} ({})", command.id, kind);

    match handlers::route(state, kind, &command.payload).await {
        Ok(result) => result,
        Err(e) => CommandResult::fail(e.to_string()),
    }
}
