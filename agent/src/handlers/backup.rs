//! Backup and restore handlers
//!
//! Dumps run inside the database pod, transit through `/tmp` on both sides
//! (`backup-<id>` / `restore-<id>` naming avoids collisions), and land on a
//! pre-signed object-store URL. Temp removal is best-effort on every path.

use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{info, warn};

use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::kube::driver;
use crate::models::command::CommandResult;
use crate::models::payloads::{BackupPayload, DatabaseKind};
use crate::shell::quote;
use crate::utils::validate_name;

const DUMP_TIMEOUT: Duration = Duration::from_secs(600);
const COPY_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn create(
    state: &Arc<AppState>,
    payload: BackupPayload,
) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.database_name)?;
    validate_name("backup id", &payload.backup_id)?;

    let outcome = run_backup(state, &payload).await;

    match outcome {
        Ok(logs) => {
            let _ = state
                .client
                .update_backup_status(&payload.backup_id, "completed", None)
                .await;
            Ok(CommandResult::ok_with_logs(logs))
        }
        Err(e) => {
            let message = e.to_string();
            let _ = state
                .client
                .update_backup_status(&payload.backup_id, "failed", Some(&message))
                .await;
            Ok(CommandResult::fail(message))
        }
    }
}

async fn run_backup(state: &Arc<AppState>, payload: &BackupPayload) -> Result<String, AgentError> {
    let pod = format!("{}-0", payload.database_name);
    let remote_path = format!("/tmp/backup-{}", payload.backup_id);
    let local_path = remote_path.clone();

    info!(
        "Backing up {} database {}/{} (backup {})",
        payload.kind, payload.namespace, payload.database_name, payload.backup_id
    );

    let dump_cmd = dump_command(payload, &remote_path)?;
    let dump = driver::exec_in_pod(&payload.namespace, &pod, &dump_cmd, DUMP_TIMEOUT).await;
    if !dump.success {
        return Err(AgentError::BackupError(
            dump.error.unwrap_or_else(|| "dump failed".to_string()),
        ));
    }

    let copied =
        driver::copy_from_pod(&payload.namespace, &pod, &remote_path, &local_path, COPY_TIMEOUT)
            .await;

    // In-pod temp removal is best-effort regardless of the copy outcome.
    let cleanup = driver::exec_in_pod(
        &payload.namespace,
        &pod,
        &format!("rm -f {}", quote(&remote_path)),
        Duration::from_secs(30),
    )
    .await;
    if !cleanup.success {
        warn!("Failed to remove {} from pod {}", remote_path, pod);
    }

    if !copied.success {
        return Err(AgentError::BackupError(
            copied
                .error
                .unwrap_or_else(|| "copying dump out of the pod failed".to_string()),
        ));
    }

    let result = async {
        let url = state.client.backup_upload_url(&payload.backup_id).await?;
        let bytes = fs::read(&local_path).await?;
        let size = bytes.len();
        state.client.upload_backup(&url, bytes).await?;
        info!("Uploaded backup {} ({} bytes)", payload.backup_id, size);
        Ok(format!("{}\n{}", dump.combined_output(), copied.combined_output()))
    }
    .await;

    if let Err(e) = fs::remove_file(&local_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove local backup file {}: {}", local_path, e);
        }
    }

    result
}

pub async fn restore(
    state: &Arc<AppState>,
    payload: BackupPayload,
) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("database name", &payload.database_name)?;
    validate_name("backup id", &payload.backup_id)?;

    let outcome = run_restore(state, &payload).await;

    match outcome {
        Ok(logs) => {
            let _ = state
                .client
                .update_backup_status(&payload.backup_id, "restored", None)
                .await;
            Ok(CommandResult::ok_with_logs(logs))
        }
        Err(e) => {
            let message = e.to_string();
            let _ = state
                .client
                .update_backup_status(&payload.backup_id, "restore_failed", Some(&message))
                .await;
            Ok(CommandResult::fail(message))
        }
    }
}

async fn run_restore(state: &Arc<AppState>, payload: &BackupPayload) -> Result<String, AgentError> {
    let download_url = payload.download_url.as_deref().ok_or_else(|| {
        AgentError::ValidationError("restore requires a download URL".to_string())
    })?;

    let pod = format!("{}-0", payload.database_name);
    let remote_path = format!("/tmp/restore-{}", payload.backup_id);
    let local_path = remote_path.clone();

    info!(
        "Restoring {} database {}/{} (backup {})",
        payload.kind, payload.namespace, payload.database_name, payload.backup_id
    );

    let bytes = state.client.download_backup(download_url).await?;
    fs::write(&local_path, bytes).await?;

    let copied =
        driver::copy_to_pod(&payload.namespace, &pod, &local_path, &remote_path, COPY_TIMEOUT)
            .await;

    if let Err(e) = fs::remove_file(&local_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove local restore file {}: {}", local_path, e);
        }
    }

    if !copied.success {
        return Err(AgentError::BackupError(
            copied
                .error
                .unwrap_or_else(|| "copying dump into the pod failed".to_string()),
        ));
    }

    let restore_cmd = restore_command(payload, &remote_path)?;
    let restored = driver::exec_in_pod(&payload.namespace, &pod, &restore_cmd, DUMP_TIMEOUT).await;

    let cleanup = driver::exec_in_pod(
        &payload.namespace,
        &pod,
        &format!("rm -f {}", quote(&remote_path)),
        Duration::from_secs(30),
    )
    .await;
    if !cleanup.success {
        warn!("Failed to remove {} from pod {}", remote_path, pod);
    }

    if !restored.success {
        return Err(AgentError::BackupError(
            restored
                .error
                .unwrap_or_else(|| "restore failed".to_string()),
        ));
    }

    info!("Restored backup {}", payload.backup_id);
    Ok(restored.combined_output())
}

/// In-pod dump command. Untrusted values are single-quote escaped; the
/// command runs under `sh -c` inside the pod.
fn dump_command(payload: &BackupPayload, remote_path: &str) -> Result<String, AgentError> {
    let username = payload
        .username
        .as_deref()
        .unwrap_or_else(|| payload.kind.default_username());
    let database = payload
        .database
        .as_deref()
        .unwrap_or(&payload.database_name);
    let password = payload.password.as_deref().unwrap_or_default();

    match payload.kind {
        DatabaseKind::Postgres => Ok(format!(
            "PGPASSWORD={password} pg_dump -U {user} -d {db} -F c -f {path}",
            password = quote(password),
            user = quote(username),
            db = quote(database),
            path = quote(remote_path),
        )),
        DatabaseKind::Mongodb => Ok(format!(
            "mongodump --username {user} --password {password} --authenticationDatabase admin --archive={path}",
            user = quote(username),
            password = quote(password),
            path = quote(remote_path),
        )),
        DatabaseKind::Redis => Err(AgentError::ValidationError(
            "backups are not supported for redis".to_string(),
        )),
    }
}

/// In-pod restore command, mirroring [`dump_command`]
fn restore_command(payload: &BackupPayload, remote_path: &str) -> Result<String, AgentError> {
    let username = payload
        .username
        .as_deref()
        .unwrap_or_else(|| payload.kind.default_username());
    let database = payload
        .database
        .as_deref()
        .unwrap_or(&payload.database_name);
    let password = payload.password.as_deref().unwrap_or_default();

    match payload.kind {
        DatabaseKind::Postgres => Ok(format!(
            "PGPASSWORD={password} pg_restore -U {user} -d {db} --clean --if-exists {path}",
            password = quote(password),
            user = quote(username),
            db = quote(database),
            path = quote(remote_path),
        )),
        DatabaseKind::Mongodb => Ok(format!(
            "mongorestore --username {user} --password {password} --authenticationDatabase admin --drop --archive={path}",
            user = quote(username),
            password = quote(password),
            path = quote(remote_path),
        )),
        DatabaseKind::Redis => Err(AgentError::ValidationError(
            "restore is not supported for redis".to_string(),
        )),
    }
}
