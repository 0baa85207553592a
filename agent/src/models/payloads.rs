//! Typed command payloads
//!
//! `Command.payload` arrives as opaque JSON; each handler deserializes the
//! struct for its kind at the dispatch boundary so a malformed payload turns
//! into a validation failure for that one command.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::build::{BuildSpec, Framework};

fn default_branch() -> String {
    "main".to_string()
}

fn default_port() -> u16 {
    3000
}

/// DEPLOY payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPayload {
    pub app_name: String,
    pub deployment_id: String,
    pub namespace: String,
    pub git_repo_url: String,

    #[serde(default = "default_branch")]
    pub git_branch: String,

    #[serde(default)]
    pub git_token: Option<String>,

    pub framework: Framework,

    #[serde(default)]
    pub build_command: Option<String>,

    #[serde(default)]
    pub start_command: Option<String>,

    #[serde(default)]
    pub output_directory: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Default domain assigned by the platform, if any
    #[serde(default)]
    pub domain: Option<String>,
}

impl DeployPayload {
    pub fn build_spec(&self) -> BuildSpec {
        BuildSpec {
            app_name: self.app_name.clone(),
            deployment_id: self.deployment_id.clone(),
            git_repo_url: self.git_repo_url.clone(),
            git_branch: self.git_branch.clone(),
            git_token: self.git_token.clone(),
            framework: self.framework,
            build_command: self.build_command.clone(),
            start_command: self.start_command.clone(),
            output_directory: self.output_directory.clone(),
            port: self.port,
            env_vars: self.env_vars.clone(),
            nuxt_major_version: None,
        }
    }
}

/// STOP / RESTART / DELETE payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPayload {
    pub app_name: String,
    pub namespace: String,
}

/// CREATE_NAMESPACE payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacePayload {
    pub user_id: String,

    #[serde(default)]
    pub token: Option<String>,
}

/// UPDATE_ENV payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvPayload {
    pub app_name: String,
    pub namespace: String,

    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

/// ADD_CUSTOM_DOMAIN / REMOVE_CUSTOM_DOMAIN payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainPayload {
    pub app_name: String,
    pub namespace: String,
    pub domain: String,

    #[serde(default)]
    pub port: Option<u16>,
}

/// Database engines the platform provisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Postgres,
    Mongodb,
    Redis,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
        }
    }

    /// The image's own default superuser, used when the payload omits one
    pub fn default_username(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mongodb => "root",
            Self::Redis => "default",
        }
    }

    pub fn default_version(&self) -> &'static str {
        match self {
            Self::Postgres => "16",
            Self::Mongodb => "7",
            Self::Redis => "7",
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_storage_size() -> String {
    "1Gi".to_string()
}

fn default_memory_limit() -> String {
    "512Mi".to_string()
}

/// CREATE_DATABASE / DELETE_DATABASE payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabasePayload {
    pub name: String,
    pub namespace: String,

    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub database_name: Option<String>,

    #[serde(default = "default_storage_size")]
    pub storage_size: String,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,
}

/// UPDATE_DATABASE_PASSWORD payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabasePasswordPayload {
    pub name: String,
    pub namespace: String,

    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    pub password: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub database_name: Option<String>,
}

/// ENABLE/DISABLE_DATABASE_EXTERNAL_ACCESS payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccessPayload {
    pub name: String,
    pub namespace: String,

    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    /// SNI hostname routed to the database
    pub domain: String,
}

/// CREATE_BACKUP / RESTORE_BACKUP payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    pub backup_id: String,
    pub namespace: String,

    /// StatefulSet name of the database being backed up
    pub database_name: String,

    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub database: Option<String>,

    /// Pre-signed source URL; present on RESTORE_BACKUP only
    #[serde(default)]
    pub download_url: Option<String>,
}
