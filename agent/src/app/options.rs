//! Application configuration options
//!
//! All configuration arrives through the environment; the only hard
//! requirement is `SERVER_TOKEN`.

use std::env;
use std::time::Duration;

use crate::errors::AgentError;
use crate::logs::LogLevel;
use crate::workers::{heartbeat, poller, relay, resources};

/// Environment-derived settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_token: String,
    pub backend_url: String,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub resource_interval: Duration,
    pub max_concurrent_commands: usize,
    pub log_level: LogLevel,
    pub http_port: u16,
    pub bind_host: String,
}

impl Settings {
    /// Load settings from the environment. `SERVER_TOKEN` is required;
    /// everything else defaults.
    pub fn from_env() -> Result<Self, AgentError> {
        let server_token = env::var("SERVER_TOKEN").map_err(|_| {
            AgentError::ConfigError("SERVER_TOKEN environment variable is required".to_string())
        })?;

        Ok(Self {
            server_token,
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            poll_interval: duration_ms_var("POLL_INTERVAL_MS", 10_000)?,
            heartbeat_interval: duration_ms_var("HEARTBEAT_INTERVAL_MS", 30_000)?,
            resource_interval: duration_ms_var("RESOURCE_INTERVAL_MS", 60_000)?,
            max_concurrent_commands: parsed_var("MAX_CONCURRENT_COMMANDS", 3)?,
            log_level: env::var("LOG_LEVEL")
                .ok()
                .map(|raw| {
                    raw.parse::<LogLevel>()
                        .map_err(AgentError::ConfigError)
                })
                .transpose()?
                .unwrap_or_default(),
            http_port: parsed_var("PORT", 3000)?,
            bind_host: env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        })
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AgentError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            AgentError::ConfigError(format!("invalid value for {}: {:?}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

fn duration_ms_var(name: &str, default_ms: u64) -> Result<Duration, AgentError> {
    Ok(Duration::from_millis(parsed_var(name, default_ms)?))
}

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Backend API base URL
    pub backend_url: String,

    /// Shared token authenticating this node to the control plane
    pub server_token: String,

    /// In-flight command ceiling
    pub max_concurrent_commands: usize,

    /// Log relay queue capacity
    pub relay_capacity: usize,

    /// Maximum delay for graceful shutdown; long enough to drain a build
    pub max_shutdown_delay: Duration,

    /// Server configuration
    pub server: ServerOptions,

    /// Control loop options
    pub poller: poller::Options,

    /// Heartbeat worker options
    pub heartbeat: heartbeat::Options,

    /// Resource report worker options
    pub resources: resources::Options,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backend_url: settings.backend_url.clone(),
            server_token: settings.server_token.clone(),
            max_concurrent_commands: settings.max_concurrent_commands,
            relay_capacity: relay::DEFAULT_QUEUE_CAPACITY,
            max_shutdown_delay: Duration::from_secs(900),
            server: ServerOptions {
                host: settings.bind_host.clone(),
                port: settings.http_port,
            },
            poller: poller::Options {
                interval: settings.poll_interval,
            },
            heartbeat: heartbeat::Options {
                interval: settings.heartbeat_interval,
            },
            resources: resources::Options {
                interval: settings.resource_interval,
            },
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}
