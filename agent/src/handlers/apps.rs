//! App lifecycle handlers: stop, restart, delete, namespace, env vars

use tracing::info;

use crate::errors::AgentError;
use crate::handlers::into_result;
use crate::kube::driver;
use crate::models::command::CommandResult;
use crate::models::payloads::{AppPayload, NamespacePayload, UpdateEnvPayload};

pub async fn stop(payload: AppPayload) -> Result<CommandResult, AgentError> {
    info!("Stopping app {}/{}", payload.namespace, payload.app_name);
    let result = driver::stop(&payload.namespace, &payload.app_name).await;
    Ok(into_result("stop", result))
}

pub async fn restart(payload: AppPayload) -> Result<CommandResult, AgentError> {
    info!("Restarting app {}/{}", payload.namespace, payload.app_name);
    let result = driver::restart(&payload.namespace, &payload.app_name).await;
    Ok(into_result("restart", result))
}

pub async fn delete(payload: AppPayload) -> Result<CommandResult, AgentError> {
    info!("Deleting app {}/{}", payload.namespace, payload.app_name);
    let result = driver::delete_app(&payload.namespace, &payload.app_name).await;
    Ok(into_result("delete", result))
}

pub async fn create_namespace(payload: NamespacePayload) -> Result<CommandResult, AgentError> {
    let result = driver::ensure_namespace(&payload.user_id, payload.token.as_deref()).await;
    Ok(into_result("create namespace", result))
}

pub async fn update_env(payload: UpdateEnvPayload) -> Result<CommandResult, AgentError> {
    info!(
        "Updating {} env var(s) on {}/{}",
        payload.env_vars.len(),
        payload.namespace,
        payload.app_name
    );
    let result =
        driver::set_env_vars(&payload.namespace, &payload.app_name, &payload.env_vars).await;
    Ok(into_result("update env", result))
}
