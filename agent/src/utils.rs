//! Utility functions

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Cooldown options for exponential backoff
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Calculate exponential backoff delay
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay_secs = options.base_delay.as_secs_f64() * options.multiplier.powi(attempt as i32);
    let capped_delay = delay_secs.min(options.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped_delay)
}

/// DNS-1123-style rule for namespaces and app names, checked before any
/// shell interpolation of either.
static RESOURCE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9\-\.]*[a-z0-9])?$").expect("valid regex")
});

/// Validate a namespace, app, or database name
pub fn validate_name(kind: &str, value: &str) -> Result<(), AgentError> {
    if RESOURCE_NAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(AgentError::ValidationError(format!(
            "invalid {}: {:?}",
            kind, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_backoff() {
        let options = CooldownOptions::default();

        assert_eq!(calc_exp_backoff(&options, 0), Duration::from_secs(1));
        assert_eq!(calc_exp_backoff(&options, 1), Duration::from_secs(2));
        assert_eq!(calc_exp_backoff(&options, 2), Duration::from_secs(4));
        assert_eq!(calc_exp_backoff(&options, 10), Duration::from_secs(60)); // Capped at max
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("app", "hello").is_ok());
        assert!(validate_name("app", "my-app.v2").is_ok());
        assert!(validate_name("app", "a").is_ok());

        assert!(validate_name("app", "").is_err());
        assert!(validate_name("app", "-leading").is_err());
        assert!(validate_name("app", "trailing-").is_err());
        assert!(validate_name("app", "UPPER").is_err());
        assert!(validate_name("app", "has space").is_err());
        assert!(validate_name("app", "semi;colon").is_err());
    }
}
