//! Control-plane API surface

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AgentError;
use crate::http::client::ControlPlaneClient;
use crate::models::agent::{AgentIdentity, HeartbeatSnapshot, RegisterRequest, ResourceSnapshot};
use crate::models::command::{Command, CommandResult};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Deadline for fire-and-forget log/status pushes
const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for pre-signed object-store transfers
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Registration attempts before the agent continues degraded
const REGISTER_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct Received {
    #[allow(dead_code)]
    received: bool,
}

#[derive(Debug, Deserialize)]
struct CommandAck {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    status: String,
}

/// One streamed deployment log line
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentLogEntry {
    pub message: String,
    pub level: String,
    pub timestamp: DateTime<Utc>,
    pub step: String,
}

#[derive(Debug, Clone, Serialize)]
struct DeploymentStatusUpdate<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct BackupStatusUpdate<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    url: String,
}

impl ControlPlaneClient {
    /// Register this node with the control plane
    pub async fn register(&self, request: &RegisterRequest) -> Result<AgentIdentity, AgentError> {
        let url = self.agents_url("/register");
        self.post(&url, request, None).await
    }

    /// Register with exponential backoff. Exhaustion is an error; the caller
    /// continues degraded and re-registers from the heartbeat loop.
    pub async fn register_with_backoff(
        &self,
        request: &RegisterRequest,
    ) -> Result<AgentIdentity, AgentError> {
        let cooldown = CooldownOptions::default();

        for attempt in 0..REGISTER_ATTEMPTS {
            match self.register(request).await {
                Ok(identity) => {
                    info!("Registered as agent {} ({})", identity.name, identity.id);
                    return Ok(identity);
                }
                Err(e) => {
                    let delay = calc_exp_backoff(&cooldown, attempt);
                    warn!(
                        "Registration attempt {}/{} failed: {}. Retrying in {:?}...",
                        attempt + 1,
                        REGISTER_ATTEMPTS,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(AgentError::RegistrationError(format!(
            "registration failed after {} attempts",
            REGISTER_ATTEMPTS
        )))
    }

    /// Send a heartbeat snapshot
    pub async fn heartbeat(&self, snapshot: &HeartbeatSnapshot) -> Result<(), AgentError> {
        let url = self.agents_url("/heartbeat");
        let _: Received = self.post(&url, snapshot, None).await?;
        Ok(())
    }

    /// Fetch commands awaiting this agent
    pub async fn pending_commands(&self) -> Result<Vec<Command>, AgentError> {
        let url = self.agents_url("/commands");
        self.get(&url).await
    }

    /// Acknowledge receipt of a command
    pub async fn ack_command(&self, command_id: &str) -> Result<(), AgentError> {
        let url = self.agents_url(&format!("/commands/{}/ack", command_id));
        let _: CommandAck = self.patch(&url, &serde_json::json!({}), None).await?;
        Ok(())
    }

    /// Mark a command as running
    pub async fn mark_running(&self, command_id: &str) -> Result<(), AgentError> {
        let url = self.agents_url(&format!("/commands/{}/running", command_id));
        let _: CommandAck = self.patch(&url, &serde_json::json!({}), None).await?;
        Ok(())
    }

    /// Send the terminal result of a command
    pub async fn send_result(
        &self,
        command_id: &str,
        result: &CommandResult,
    ) -> Result<(), AgentError> {
        let url = self.agents_url(&format!("/commands/{}/result", command_id));
        let _: CommandAck = self.patch(&url, result, None).await?;
        Ok(())
    }

    /// Report a periodic resource snapshot
    pub async fn report_resources(&self, snapshot: &ResourceSnapshot) -> Result<(), AgentError> {
        let url = self.agents_url("/resources");
        let _: Received = self.post(&url, snapshot, None).await?;
        Ok(())
    }

    /// Push one deployment log line (best-effort, short deadline)
    pub async fn send_deployment_log(
        &self,
        deployment_id: &str,
        entry: &DeploymentLogEntry,
    ) -> Result<(), AgentError> {
        let url = self.url(&format!("/api/deployments/{}/logs", deployment_id));
        let _: serde_json::Value = self.post(&url, entry, Some(RELAY_TIMEOUT)).await?;
        Ok(())
    }

    /// Push a deployment status transition (best-effort, short deadline)
    pub async fn update_deployment_status(
        &self,
        deployment_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), AgentError> {
        let url = self.url(&format!("/api/deployments/{}/status", deployment_id));
        let body = DeploymentStatusUpdate { status, message };
        let _: serde_json::Value = self.patch(&url, &body, Some(RELAY_TIMEOUT)).await?;
        Ok(())
    }

    /// Obtain a pre-signed upload URL for a backup archive
    pub async fn backup_upload_url(&self, backup_id: &str) -> Result<String, AgentError> {
        let url = self.agents_url(&format!("/backups/{}/upload-url", backup_id));
        let response: UploadUrlResponse = self.get(&url).await?;
        Ok(response.url)
    }

    /// Report backup progress to the control plane
    pub async fn update_backup_status(
        &self,
        backup_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<(), AgentError> {
        let url = self.agents_url(&format!("/backups/{}/status", backup_id));
        let body = BackupStatusUpdate { status, message };
        let _: serde_json::Value = self.patch(&url, &body, None).await?;
        Ok(())
    }

    /// Upload a backup archive to its pre-signed URL
    pub async fn upload_backup(&self, url: &str, bytes: Vec<u8>) -> Result<(), AgentError> {
        self.put_presigned(url, bytes, TRANSFER_TIMEOUT).await
    }

    /// Download a backup archive from a pre-signed URL
    pub async fn download_backup(&self, url: &str) -> Result<Vec<u8>, AgentError> {
        self.get_presigned(url, TRANSFER_TIMEOUT).await
    }
}
