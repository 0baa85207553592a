//! Database lifecycle handlers

use tracing::info;

use crate::errors::AgentError;
use crate::handlers::into_result;
use crate::kube::manifests::DatabaseStatefulSetInput;
use crate::kube::{driver, manifests};
use crate::models::command::CommandResult;
use crate::models::payloads::{
    DatabasePasswordPayload, DatabasePayload, ExternalAccessPayload,
};
use crate::utils::validate_name;

pub async fn create(payload: DatabasePayload) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.name)?;

    let password = payload
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            AgentError::ValidationError("database password is required".to_string())
        })?;

    let kind = payload.kind;
    let version = payload
        .version
        .as_deref()
        .unwrap_or_else(|| kind.default_version());
    let username = payload
        .username
        .as_deref()
        .unwrap_or_else(|| kind.default_username());
    let database = payload.database_name.as_deref().unwrap_or(&payload.name);

    info!(
        "Creating {} database {}/{} ({})",
        kind, payload.namespace, payload.name, version
    );

    let steps = [
        manifests::database_secret(
            &payload.namespace,
            &payload.name,
            kind,
            username,
            password,
            database,
        ),
        manifests::database_pvc(&payload.namespace, &payload.name, &payload.storage_size),
        manifests::database_service(&payload.namespace, &payload.name, kind),
        manifests::database_statefulset(&DatabaseStatefulSetInput {
            namespace: &payload.namespace,
            name: &payload.name,
            kind,
            version,
            username,
            memory_limit: &payload.memory_limit,
        }),
    ];

    let mut logs = String::new();
    for manifest in &steps {
        let result = driver::apply_manifest(manifest).await;
        if !logs.is_empty() {
            logs.push('\n');
        }
        logs.push_str(&result.combined_output());
        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "applying database manifest failed".to_string());
            return Ok(CommandResult::fail_with_logs(error, logs));
        }
    }

    let ready = driver::wait_statefulset_ready(&payload.namespace, &payload.name).await;
    if !ready.success {
        let error = ready
            .error
            .unwrap_or_else(|| "database did not become ready".to_string());
        return Ok(CommandResult::fail_with_logs(error, logs));
    }

    info!("Database {}/{} is ready", payload.namespace, payload.name);
    Ok(CommandResult::ok_with_logs(logs))
}

pub async fn delete(payload: DatabasePayload) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.name)?;

    info!(
        "Deleting {} database {}/{}",
        payload.kind, payload.namespace, payload.name
    );

    let secret = format!("{}-credentials", payload.name);
    let pvc = format!("{}-data", payload.name);
    let external = format!("{}-external", payload.name);

    let steps = [
        ("statefulset", payload.name.as_str()),
        ("service", payload.name.as_str()),
        ("secret", secret.as_str()),
        ("persistentvolumeclaim", pvc.as_str()),
        ("ingressroutetcp", external.as_str()),
    ];

    let mut combined = CommandResult::ok();
    let mut logs = String::new();
    for (kind, name) in steps {
        let result = driver::delete_object(&payload.namespace, kind, name).await;
        if !logs.is_empty() {
            logs.push('\n');
        }
        logs.push_str(&result.combined_output());
        if !result.success {
            combined = CommandResult::fail(
                result
                    .error
                    .unwrap_or_else(|| format!("deleting {} failed", kind)),
            );
        }
    }

    combined.logs = (!logs.is_empty()).then_some(logs);
    Ok(combined)
}

/// Re-render the credentials secret with the new password, then bounce the
/// pod so the engine picks it up.
pub async fn update_password(
    payload: DatabasePasswordPayload,
) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.name)?;

    info!(
        "Updating password for database {}/{}",
        payload.namespace, payload.name
    );

    let kind = payload.kind;
    let username = payload
        .username
        .as_deref()
        .unwrap_or_else(|| kind.default_username());
    let database = payload.database_name.as_deref().unwrap_or(&payload.name);

    let manifest = manifests::database_secret(
        &payload.namespace,
        &payload.name,
        kind,
        username,
        &payload.password,
        database,
    );
    let applied = driver::apply_manifest(&manifest).await;
    if !applied.success {
        return Ok(into_result("update password", applied));
    }

    // StatefulSet pods are ordinal; a single-replica database is always -0.
    let pod = format!("{}-0", payload.name);
    let restarted = driver::delete_object(&payload.namespace, "pod", &pod).await;
    Ok(into_result("update password", restarted))
}

pub async fn enable_external_access(
    payload: ExternalAccessPayload,
) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.name)?;
    validate_name("domain", &payload.domain)?;

    info!(
        "Enabling external access to {}/{} via {}",
        payload.namespace, payload.name, payload.domain
    );

    let manifest = manifests::ingress_route_tcp(
        &payload.namespace,
        &payload.name,
        &payload.domain,
        payload.kind,
    );
    let result = driver::apply_manifest(&manifest).await;
    Ok(into_result("enable external access", result))
}

pub async fn disable_external_access(
    payload: ExternalAccessPayload,
) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.name)?;

    info!(
        "Disabling external access to {}/{}",
        payload.namespace, payload.name
    );

    let result = driver::delete_object(
        &payload.namespace,
        "ingressroutetcp",
        &format!("{}-external", payload.name),
    )
    .await;
    Ok(into_result("disable external access", result))
}
