//! Kubernetes driver unit tests
//!
//! Only the paths that never reach kubectl: validation short-circuits and
//! the empty-map no-op.

use std::collections::HashMap;
use std::time::Duration;

use dpagent::kube::driver;

#[tokio::test]
async fn empty_env_map_is_a_noop_success() {
    // Succeeds on a machine with no cluster at all: nothing is invoked.
    let result = driver::set_env_vars("user-1", "hello", &HashMap::new()).await;
    assert!(result.success);
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn invalid_names_fail_before_any_interpolation() {
    let result = driver::stop("user-1", "hello; rm -rf /").await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("invalid app name"));

    let result = driver::restart("Bad_Namespace", "hello").await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("invalid namespace"));

    let mut env = HashMap::new();
    env.insert("KEY".to_string(), "value".to_string());
    let result = driver::set_env_vars("user-1", "-bad-", &env).await;
    assert!(!result.success);
}

#[tokio::test]
async fn execute_command_is_a_shell_passthrough() {
    let result = driver::execute_command("echo passthrough", Duration::from_secs(5)).await;
    assert!(result.success);
    assert_eq!(result.stdout, "passthrough");
}
