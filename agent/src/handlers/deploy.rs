//! DEPLOY handler: build the image, then roll it out

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::state::AppState;
use crate::build::BuildEngine;
use crate::errors::AgentError;
use crate::kube::driver;
use crate::models::command::CommandResult;
use crate::models::payloads::DeployPayload;

pub async fn handle(
    state: &Arc<AppState>,
    payload: DeployPayload,
) -> Result<CommandResult, AgentError> {
    let relay = state.relay.clone();
    let deployment_id = payload.deployment_id.clone();

    info!(
        "Deploying {} ({} from {})",
        payload.app_name, payload.framework, payload.git_repo_url
    );

    relay.update_status(&deployment_id, "building", None);

    let engine = BuildEngine::new(relay.clone());
    let artifact = engine.build(&payload.build_spec()).await;

    if !artifact.success {
        let cause = artifact
            .error
            .unwrap_or_else(|| "build failed".to_string());
        error!("Build of {} failed: {}", payload.app_name, cause);
        relay.update_status(&deployment_id, "failed", Some(&cause));
        return Ok(CommandResult::fail_with_logs(cause, artifact.logs));
    }

    relay.update_status(&deployment_id, "deploying", None);

    let namespace_result = driver::ensure_namespace(&payload.namespace, None).await;
    if !namespace_result.success {
        let cause = namespace_result
            .error
            .unwrap_or_else(|| "namespace creation failed".to_string());
        relay.update_status(&deployment_id, "failed", Some(&cause));
        return Ok(CommandResult::fail_with_logs(cause, artifact.logs));
    }

    let deploy_result = driver::deploy_app(
        &payload.namespace,
        &payload.app_name,
        &artifact.image_name,
        Some(artifact.exposed_port),
        payload.domain.as_deref(),
    )
    .await;

    if !deploy_result.success {
        let cause = deploy_result
            .error
            .clone()
            .unwrap_or_else(|| "deploy failed".to_string());
        error!("Rollout of {} failed: {}", payload.app_name, cause);

        // Best-effort teardown of whatever was partially created.
        let cleanup = driver::delete_deployment(&payload.namespace, &payload.app_name).await;
        if !cleanup.success {
            warn!(
                "Cleanup after failed deploy of {} also failed: {:?}",
                payload.app_name, cleanup.error
            );
        }

        relay.update_status(&deployment_id, "failed", Some(&cause));
        let logs = format!("{}\n{}", artifact.logs, deploy_result.combined_output());
        return Ok(CommandResult::fail_with_logs(cause, logs));
    }

    if !payload.env_vars.is_empty() {
        let env_result =
            driver::set_env_vars(&payload.namespace, &payload.app_name, &payload.env_vars).await;
        if !env_result.success {
            let cause = env_result
                .error
                .unwrap_or_else(|| "applying env vars failed".to_string());
            relay.update_status(&deployment_id, "failed", Some(&cause));
            return Ok(CommandResult::fail_with_logs(cause, artifact.logs));
        }
    }

    info!(
        "Deployed {} as {} (port {})",
        payload.app_name, artifact.image_name, artifact.exposed_port
    );
    relay.send_log(
        &deployment_id,
        &format!("Deployed {}", artifact.image_name),
        "info",
        "deploy",
    );
    relay.update_status(&deployment_id, "ready", None);

    Ok(CommandResult::ok_with_logs(artifact.logs))
}
