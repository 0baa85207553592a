//! Command handlers
//!
//! One module per command family. Handlers compose the kube driver and the
//! build engine, and fold every failure into a `CommandResult` instead of
//! bubbling it past the dispatcher.

pub mod apps;
pub mod backup;
pub mod database;
pub mod deploy;
pub mod domains;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::models::command::{CommandKind, CommandResult};
use crate::shell::ShellResult;

/// Route a parsed command kind to its handler
pub async fn route(
    state: &Arc<AppState>,
    kind: CommandKind,
    payload: &serde_json::Value,
) -> Result<CommandResult, AgentError> {
    match kind {
        CommandKind::Deploy => deploy::handle(state, parse(payload)?).await,
        CommandKind::Stop => apps::stop(parse(payload)?).await,
        CommandKind::Restart => apps::restart(parse(payload)?).await,
        CommandKind::Delete => apps::delete(parse(payload)?).await,
        CommandKind::CreateNamespace => apps::create_namespace(parse(payload)?).await,
        CommandKind::UpdateEnv => apps::update_env(parse(payload)?).await,
        CommandKind::AddCustomDomain => domains::add(parse(payload)?).await,
        CommandKind::RemoveCustomDomain => domains::remove(parse(payload)?).await,
        CommandKind::CreateDatabase => database::create(parse(payload)?).await,
        CommandKind::DeleteDatabase => database::delete(parse(payload)?).await,
        CommandKind::UpdateDatabasePassword => database::update_password(parse(payload)?).await,
        CommandKind::EnableDatabaseExternalAccess => {
            database::enable_external_access(parse(payload)?).await
        }
        CommandKind::DisableDatabaseExternalAccess => {
            database::disable_external_access(parse(payload)?).await
        }
        CommandKind::CreateBackup => backup::create(state, parse(payload)?).await,
        CommandKind::RestoreBackup => backup::restore(state, parse(payload)?).await,
    }
}

/// Deserialize a typed payload, folding failures into validation errors
fn parse<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T, AgentError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| AgentError::ValidationError(format!("invalid payload: {}", e)))
}

/// Convert a driver result into a command result
pub(crate) fn into_result(operation: &str, result: ShellResult) -> CommandResult {
    let logs = result.combined_output();
    if result.success {
        CommandResult::ok_with_logs(logs)
    } else {
        let error = result
            .error
            .unwrap_or_else(|| format!("{} failed", operation));
        CommandResult::fail_with_logs(error, logs)
    }
}
