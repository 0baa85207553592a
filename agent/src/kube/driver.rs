//! Thin verbs over kubectl and the site-local helper scripts
//!
//! Every verb returns a [`ShellResult`]; callers decide whether a failed
//! sub-step is fatal. Names are validated before any interpolation.

use std::time::Duration;

use tracing::{debug, info};

use crate::shell::{self, ShellResult};
use crate::utils::validate_name;

const KUBECTL_TIMEOUT: Duration = Duration::from_secs(30);
const ROLLOUT_TIMEOUT: Duration = Duration::from_secs(60);
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(120);
const READY_DEADLINE: Duration = Duration::from_secs(120);
const READY_POLL: Duration = Duration::from_secs(5);

fn invalid(e: crate::errors::AgentError) -> ShellResult {
    ShellResult::failure(e.to_string())
}

/// Create the per-user namespace if it does not exist
pub async fn ensure_namespace(user_id: &str, token: Option<&str>) -> ShellResult {
    if let Err(e) = validate_name("namespace", user_id) {
        return invalid(e);
    }

    info!("Ensuring namespace for user {}", user_id);
    let mut args = vec![user_id];
    if let Some(token) = token {
        args.push(token);
    }
    shell::run_args("deploypilot-create-namespace", &args, SCRIPT_TIMEOUT).await
}

/// Deploy an app via the site helper script
pub async fn deploy_app(
    namespace: &str,
    app: &str,
    image: &str,
    port: Option<u16>,
    domain: Option<&str>,
) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    info!("Deploying {} in namespace {} from {}", app, namespace, image);

    let port_arg;
    let mut args = vec![namespace, app, image];
    if let Some(port) = port {
        port_arg = port.to_string();
        args.push(&port_arg);
    }
    if let Some(domain) = domain {
        args.push(domain);
    }
    shell::run_args("deploypilot-deploy-app", &args, SCRIPT_TIMEOUT).await
}

/// Delete an app via the site helper script
pub async fn delete_app(namespace: &str, app: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    info!("Deleting app {} in namespace {}", app, namespace);
    shell::run_args("deploypilot-delete-app", &[namespace, app], SCRIPT_TIMEOUT).await
}

/// Restart an app's Deployment
pub async fn restart(namespace: &str, app: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    let deployment = format!("deployment/{}", app);
    shell::run_args(
        "kubectl",
        &["rollout", "restart", &deployment, "-n", namespace],
        ROLLOUT_TIMEOUT,
    )
    .await
}

/// Stop an app by scaling its Deployment to zero
pub async fn stop(namespace: &str, app: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    let deployment = format!("deployment/{}", app);
    shell::run_args(
        "kubectl",
        &["scale", &deployment, "-n", namespace, "--replicas=0"],
        ROLLOUT_TIMEOUT,
    )
    .await
}

/// Apply environment variables to an app's Deployment. An empty map is a
/// no-op success: nothing to change, nothing invoked.
pub async fn set_env_vars(
    namespace: &str,
    app: &str,
    env_vars: &std::collections::HashMap<String, String>,
) -> ShellResult {
    if env_vars.is_empty() {
        return ShellResult {
            success: true,
            ..ShellResult::default()
        };
    }
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    let deployment = format!("deployment/{}", app);
    let mut pairs: Vec<String> = env_vars
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    pairs.sort();

    let mut args: Vec<&str> = vec!["set", "env", &deployment, "-n", namespace];
    args.extend(pairs.iter().map(String::as_str));
    shell::run_args("kubectl", &args, ROLLOUT_TIMEOUT).await
}

/// Delete a Deployment together with its Service and Ingress. Each sub-step
/// tolerates absence; the composite fails only if a sub-step failed.
pub async fn delete_deployment(namespace: &str, app: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    let mut combined = ShellResult {
        success: true,
        ..ShellResult::default()
    };

    for kind in ["deployment", "service", "ingress"] {
        let step = delete_object(namespace, kind, app).await;
        if !step.stdout.is_empty() {
            if !combined.stdout.is_empty() {
                combined.stdout.push('\n');
            }
            combined.stdout.push_str(&step.stdout);
        }
        if !step.success {
            combined.success = false;
            combined.error = step.error.or(combined.error);
            combined.stderr.push_str(&step.stderr);
        }
    }

    combined
}

/// Delete one namespaced object, tolerating absence
pub async fn delete_object(namespace: &str, kind: &str, name: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("object name", name) {
        return invalid(e);
    }

    debug!("Deleting {} {} in namespace {}", kind, name, namespace);
    shell::run_args(
        "kubectl",
        &["delete", kind, name, "-n", namespace, "--ignore-not-found"],
        KUBECTL_TIMEOUT,
    )
    .await
}

/// Apply a rendered manifest via stdin
pub async fn apply_manifest(manifest: &str) -> ShellResult {
    shell::run_with_stdin(
        "kubectl",
        &["apply", "-f", "-"],
        manifest.as_bytes(),
        KUBECTL_TIMEOUT,
    )
    .await
}

/// Raw shell passthrough for callers composing their own pipelines
pub async fn execute_command(cmd: &str, timeout: Duration) -> ShellResult {
    shell::run(cmd, timeout).await
}

/// Fetch recent logs of an app's pods
pub async fn pod_logs(namespace: &str, app: &str, lines: usize) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("app name", app) {
        return invalid(e);
    }

    let deployment = format!("deployment/{}", app);
    let tail = format!("--tail={}", lines);
    shell::run_args(
        "kubectl",
        &["logs", &deployment, "-n", namespace, &tail],
        KUBECTL_TIMEOUT,
    )
    .await
}

/// Execute a shell command inside a pod
pub async fn exec_in_pod(
    namespace: &str,
    pod: &str,
    cmd: &str,
    timeout: Duration,
) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("pod name", pod) {
        return invalid(e);
    }

    shell::run_args(
        "kubectl",
        &["exec", "-n", namespace, pod, "--", "sh", "-c", cmd],
        timeout,
    )
    .await
}

/// Copy a file out of a pod
pub async fn copy_from_pod(
    namespace: &str,
    pod: &str,
    remote_path: &str,
    local_path: &str,
    timeout: Duration,
) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("pod name", pod) {
        return invalid(e);
    }

    let source = format!("{}/{}:{}", namespace, pod, remote_path);
    shell::run_args("kubectl", &["cp", &source, local_path], timeout).await
}

/// Copy a file into a pod
pub async fn copy_to_pod(
    namespace: &str,
    pod: &str,
    local_path: &str,
    remote_path: &str,
    timeout: Duration,
) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("pod name", pod) {
        return invalid(e);
    }

    let dest = format!("{}/{}:{}", namespace, pod, remote_path);
    shell::run_args("kubectl", &["cp", local_path, &dest], timeout).await
}

/// Wait until a StatefulSet reports one ready replica
pub async fn wait_statefulset_ready(namespace: &str, name: &str) -> ShellResult {
    if let Err(e) = validate_name("namespace", namespace) {
        return invalid(e);
    }
    if let Err(e) = validate_name("object name", name) {
        return invalid(e);
    }

    let started = tokio::time::Instant::now();
    loop {
        let probe = shell::run_args(
            "kubectl",
            &[
                "get",
                "statefulset",
                name,
                "-n",
                namespace,
                "-o",
                "jsonpath={.status.readyReplicas}",
            ],
            KUBECTL_TIMEOUT,
        )
        .await;

        if probe.success && probe.stdout.trim() == "1" {
            info!("StatefulSet {}/{} is ready", namespace, name);
            return probe;
        }

        if started.elapsed() >= READY_DEADLINE {
            return ShellResult {
                success: false,
                stdout: probe.stdout,
                stderr: probe.stderr,
                error: Some(format!(
                    "statefulset {}/{} not ready after {}s",
                    namespace,
                    name,
                    READY_DEADLINE.as_secs()
                )),
            };
        }

        tokio::time::sleep(READY_POLL).await;
    }
}

/// Names of all Running pods across the cluster
pub async fn running_pods() -> Vec<String> {
    let result = shell::run_args(
        "kubectl",
        &[
            "get",
            "pods",
            "-A",
            "--field-selector=status.phase=Running",
            "--no-headers",
            "-o",
            "custom-columns=NAME:.metadata.name",
        ],
        KUBECTL_TIMEOUT,
    )
    .await;

    if !result.success {
        return Vec::new();
    }

    result
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Server version of the local cluster, for registration
pub async fn kube_version() -> String {
    let result = shell::run_args("kubectl", &["version", "--output=json"], KUBECTL_TIMEOUT).await;
    if !result.success {
        return "unknown".to_string();
    }

    serde_json::from_str::<serde_json::Value>(&result.stdout)
        .ok()
        .and_then(|v| {
            v.pointer("/serverVersion/gitVersion")
                .and_then(|g| g.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}
