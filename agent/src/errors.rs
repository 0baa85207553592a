//! Error types for the DeployPilot agent

use thiserror::Error;

/// Main error type for the DeployPilot agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Control plane error: {0}")]
    ControlPlaneError(String),

    #[error("Registration error: {0}")]
    RegistrationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Timed out: {0}")]
    TimeoutError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("Unknown command kind: {0}")]
    UnknownKind(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
