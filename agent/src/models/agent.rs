//! Agent identity, heartbeat, and resource wire types

use serde::{Deserialize, Serialize};

/// Identity assigned by the control plane at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
    pub status: String,

    /// Platform-wide defaults pushed down at registration
    #[serde(default)]
    pub config: AgentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub apps_domain: Option<String>,
    pub server_ip: Option<String>,
}

/// Registration request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub hostname: String,
    pub kube_version: String,
    pub resources: HostResources,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResources {
    pub cpu_cores: usize,
    pub ram_mb: u64,
    pub disk_gb: u64,
}

/// Liveness status reported with each heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Busy,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Online => write!(f, "online"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// Heartbeat body sent every cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSnapshot {
    pub status: AgentStatus,
    pub resources: ResourceSnapshot,
    pub running_pods: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Host + cluster + database resource snapshot
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub cpu_cores: usize,
    pub cpu_usage_percent: f32,
    pub ram_total_mb: u64,
    pub ram_used_mb: u64,
    pub disk_total_gb: u64,
    pub disk_used_gb: u64,
    pub pod_count: usize,
    pub databases: Vec<DatabaseResource>,
}

/// One managed database observed on the cluster
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseResource {
    pub name: String,
    pub namespace: String,
    pub kind: String,
}
