//! Command wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work received from the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Stable command ID; executed at most once per agent process
    pub id: String,

    /// Command kind; parsed into [`CommandKind`] at the dispatch boundary
    pub kind: String,

    /// Opaque payload whose shape is determined by `kind`
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Control-plane view of the command lifecycle
    pub status: CommandStatus,

    pub created_at: DateTime<Utc>,
}

/// Control-plane lifecycle states of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Acked,
    Running,
    Completed,
    Failed,
}

/// The command kinds this agent executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Deploy,
    Stop,
    Restart,
    Delete,
    CreateNamespace,
    UpdateEnv,
    AddCustomDomain,
    RemoveCustomDomain,
    CreateDatabase,
    DeleteDatabase,
    UpdateDatabasePassword,
    EnableDatabaseExternalAccess,
    DisableDatabaseExternalAccess,
    CreateBackup,
    RestoreBackup,
}

impl CommandKind {
    /// Parse the wire representation. Unknown kinds are rejected at the
    /// dispatch boundary rather than failing the whole poll batch.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "DEPLOY" => Some(Self::Deploy),
            "STOP" => Some(Self::Stop),
            "RESTART" => Some(Self::Restart),
            "DELETE" => Some(Self::Delete),
            "CREATE_NAMESPACE" => Some(Self::CreateNamespace),
            "UPDATE_ENV" => Some(Self::UpdateEnv),
            "ADD_CUSTOM_DOMAIN" => Some(Self::AddCustomDomain),
            "REMOVE_CUSTOM_DOMAIN" => Some(Self::RemoveCustomDomain),
            "CREATE_DATABASE" => Some(Self::CreateDatabase),
            "DELETE_DATABASE" => Some(Self::DeleteDatabase),
            "UPDATE_DATABASE_PASSWORD" => Some(Self::UpdateDatabasePassword),
            "ENABLE_DATABASE_EXTERNAL_ACCESS" => Some(Self::EnableDatabaseExternalAccess),
            "DISABLE_DATABASE_EXTERNAL_ACCESS" => Some(Self::DisableDatabaseExternalAccess),
            "CREATE_BACKUP" => Some(Self::CreateBackup),
            "RESTORE_BACKUP" => Some(Self::RestoreBackup),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "DEPLOY",
            Self::Stop => "STOP",
            Self::Restart => "RESTART",
            Self::Delete => "DELETE",
            Self::CreateNamespace => "CREATE_NAMESPACE",
            Self::UpdateEnv => "UPDATE_ENV",
            Self::AddCustomDomain => "ADD_CUSTOM_DOMAIN",
            Self::RemoveCustomDomain => "REMOVE_CUSTOM_DOMAIN",
            Self::CreateDatabase => "CREATE_DATABASE",
            Self::DeleteDatabase => "DELETE_DATABASE",
            Self::UpdateDatabasePassword => "UPDATE_DATABASE_PASSWORD",
            Self::EnableDatabaseExternalAccess => "ENABLE_DATABASE_EXTERNAL_ACCESS",
            Self::DisableDatabaseExternalAccess => "DISABLE_DATABASE_EXTERNAL_ACCESS",
            Self::CreateBackup => "CREATE_BACKUP",
            Self::RestoreBackup => "RESTORE_BACKUP",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome reported back for a command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,

    /// Present whenever `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Informational; may be truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn ok_with_logs(logs: impl Into<String>) -> Self {
        let logs = logs.into();
        Self {
            success: true,
            error: None,
            logs: (!logs.is_empty()).then_some(logs),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            logs: None,
        }
    }

    pub fn fail_with_logs(error: impl Into<String>, logs: impl Into<String>) -> Self {
        let logs = logs.into();
        Self {
            success: false,
            error: Some(error.into()),
            logs: (!logs.is_empty()).then_some(logs),
        }
    }
}
