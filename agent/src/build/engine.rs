//! Build pipeline orchestration
//!
//! Owns `/tmp/deploypilot-builds/<appName>` for the duration of one build
//! and removes it on every exit path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::build::detect::{self, Detection};
use crate::build::dockerfile::{self, RecipePlan};
use crate::build::git;
use crate::errors::AgentError;
use crate::models::build::{BuildArtifact, BuildSpec, Framework};
use crate::shell;
use crate::utils::validate_name;
use crate::workers::relay::LogRelay;

/// Root of all per-deployment build workspaces
pub const BUILD_ROOT: &str = "/tmp/deploypilot-builds";

const BUILD_TIMEOUT: Duration = Duration::from_secs(600);
const IMPORT_TIMEOUT: Duration = Duration::from_secs(300);
const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the synthesized recipe inside the workspace. The `docker`
/// framework keeps its own root `Dockerfile` untouched.
const RECIPE_FILE: &str = "Dockerfile.deploypilot";

/// Lines of build output included in the terminal error log
const ERROR_TAIL_LINES: usize = 20;

/// Transforms a [`BuildSpec`] into a locally importable image
pub struct BuildEngine {
    relay: LogRelay,
}

impl BuildEngine {
    pub fn new(relay: LogRelay) -> Self {
        Self { relay }
    }

    /// Run the full pipeline. Always returns an artifact; failures carry
    /// the masked error and the accumulated log buffer.
    pub async fn build(&self, spec: &BuildSpec) -> BuildArtifact {
        let workspace = PathBuf::from(BUILD_ROOT).join(&spec.app_name);
        let mut logs = String::new();

        let outcome = self.run_pipeline(spec, &workspace, &mut logs).await;

        // Cleanup is unconditional and best-effort.
        if let Err(e) = fs::remove_dir_all(&workspace).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove build workspace {:?}: {}", workspace, e);
            }
        }

        match outcome {
            Ok((image_name, exposed_port)) => BuildArtifact {
                success: true,
                image_name,
                exposed_port,
                logs,
                error: None,
            },
            Err(e) => {
                let error = git::mask_tokens(&e.to_string());
                self.relay
                    .send_log(&spec.deployment_id, &error, "error", "build");
                BuildArtifact::failure(error, logs)
            }
        }
    }

    async fn run_pipeline(
        &self,
        spec: &BuildSpec,
        workspace: &Path,
        logs: &mut String,
    ) -> Result<(String, u16), AgentError> {
        validate_name("app name", &spec.app_name)?;
        validate_name("deployment id", &spec.deployment_id)?;

        // 1. Prepare the workspace.
        fs::create_dir_all(BUILD_ROOT).await?;
        match fs::remove_dir_all(workspace).await {
            Ok(()) => debug!("Removed stale workspace {:?}", workspace),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // 2. Clone.
        self.log(spec, logs, "Cloning repository...");
        let clone_output = git::clone_repository(
            &spec.git_repo_url,
            &spec.git_branch,
            spec.git_token.as_deref(),
            workspace,
        )
        .await?;
        push_log(logs, &clone_output);

        // 3. Detect.
        let detection = detect::detect(workspace, spec);
        self.log(
            spec,
            logs,
            &format!(
                "Detected {} ({}, lockfile: {})",
                detection.framework,
                detection.package_manager.as_str(),
                detection.has_lockfile
            ),
        );

        // 4. Synthesize the recipe.
        let recipe_path = self
            .prepare_recipe(spec, &detection, workspace, logs)
            .await?;

        // 5. Build the image.
        let tag = format!("{}:{}", spec.app_name, spec.deployment_id);
        self.log(spec, logs, &format!("Building image {}...", tag));
        self.build_image(spec, workspace, &recipe_path, &tag, logs)
            .await?;

        // 6. Import into the cluster runtime.
        self.log(spec, logs, "Importing image into cluster runtime...");
        self.import_image(&tag, logs).await?;

        // 7. Resolve the exposed port.
        let exposed_port = self.resolve_exposed_port(&tag, &detection, spec).await;
        self.log(spec, logs, &format!("Image exposes port {}", exposed_port));

        Ok((format!("docker.io/library/{}", tag), exposed_port))
    }

    async fn prepare_recipe(
        &self,
        spec: &BuildSpec,
        detection: &Detection,
        workspace: &Path,
        logs: &mut String,
    ) -> Result<String, AgentError> {
        if spec.framework == Framework::Docker && detection.has_dockerfile {
            self.log(spec, logs, "Using the repository's own Dockerfile");
            return Ok("Dockerfile".to_string());
        }

        let plan = RecipePlan {
            framework: detection.framework,
            package_manager: detection.package_manager,
            has_lockfile: detection.has_lockfile,
            build_command: spec.build_command.clone(),
            start_command: spec.start_command.clone(),
            output_directory: detection.output_directory.clone(),
            port: detection.script_port.unwrap_or(spec.port),
            nuxt_major: detection.nuxt_major,
        };

        let recipe = dockerfile::render(&plan);
        fs::write(workspace.join(RECIPE_FILE), &recipe).await?;
        self.log(
            spec,
            logs,
            &format!("Synthesized {} recipe", plan.framework),
        );
        Ok(RECIPE_FILE.to_string())
    }

    async fn build_image(
        &self,
        spec: &BuildSpec,
        workspace: &Path,
        recipe_path: &str,
        tag: &str,
        logs: &mut String,
    ) -> Result<(), AgentError> {
        let context = workspace.to_string_lossy();
        let recipe = workspace.join(recipe_path);
        let recipe = recipe.to_string_lossy();

        let relay = self.relay.clone();
        let deployment_id = spec.deployment_id.clone();

        let result = shell::spawn_streaming(
            "docker",
            &["build", "-t", tag, "-f", &recipe, &context],
            BUILD_TIMEOUT,
            |line| {
                let line = git::mask_tokens(line);
                relay.send_log(&deployment_id, &line, "info", "build");
            },
        )
        .await;

        push_log(logs, &git::mask_tokens(&result.stdout));

        if result.success {
            info!("Built image {}", tag);
            return Ok(());
        }

        // Hand the control plane a digest of the failure: the last 20
        // non-blank lines of build output.
        let tail: Vec<&str> = result
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .rev()
            .take(ERROR_TAIL_LINES)
            .collect();
        let digest: String = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        self.relay.send_log(
            &spec.deployment_id,
            &git::mask_tokens(&digest),
            "error",
            "build",
        );

        let cause = result.error.unwrap_or_else(|| "docker build failed".into());
        if cause.contains("timed out") {
            Err(AgentError::TimeoutError(cause))
        } else {
            Err(AgentError::BuildError(git::mask_tokens(&cause)))
        }
    }

    async fn import_image(&self, tag: &str, logs: &mut String) -> Result<(), AgentError> {
        // The save-and-import pipe is one of the two places a shell string
        // is unavoidable; the tag is quoted.
        let cmd = format!(
            "docker save {tag} | k3s ctr images import -",
            tag = shell::quote(tag)
        );
        let result = shell::run(&cmd, IMPORT_TIMEOUT).await;
        push_log(logs, &result.combined_output());

        if result.success {
            return Ok(());
        }

        let cause = result
            .error
            .unwrap_or_else(|| "image import failed".into());
        if cause.contains("timed out") {
            Err(AgentError::TimeoutError(cause))
        } else {
            Err(AgentError::BuildError(format!(
                "image import failed: {}\n{}",
                cause, result.stderr
            )))
        }
    }

    /// First TCP port in the image metadata wins; fall back to the detected
    /// or declared port.
    async fn resolve_exposed_port(
        &self,
        tag: &str,
        detection: &Detection,
        spec: &BuildSpec,
    ) -> u16 {
        let fallback = detection.script_port.unwrap_or(spec.port);

        let result = shell::run_args(
            "docker",
            &[
                "inspect",
                "--format",
                "{{json .Config.ExposedPorts}}",
                tag,
            ],
            INSPECT_TIMEOUT,
        )
        .await;

        if !result.success {
            return fallback;
        }

        parse_exposed_port(&result.stdout).unwrap_or(fallback)
    }

    fn log(&self, spec: &BuildSpec, logs: &mut String, message: &str) {
        debug!("[{}] {}", spec.app_name, message);
        self.relay
            .send_log(&spec.deployment_id, message, "info", "build");
        push_log(logs, message);
    }
}

fn push_log(logs: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    if logs.len() >= shell::MAX_CAPTURED_OUTPUT {
        return;
    }
    if !logs.is_empty() {
        logs.push('\n');
    }
    logs.push_str(chunk);
}

/// Parse `docker inspect`'s ExposedPorts JSON (`{"3000/tcp":{}}`)
pub fn parse_exposed_port(raw: &str) -> Option<u16> {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let map = value.as_object()?;

    let mut tcp_ports: Vec<u16> = map
        .keys()
        .filter_map(|key| key.strip_suffix("/tcp"))
        .filter_map(|port| port.parse().ok())
        .collect();
    tcp_ports.sort_unstable();
    tcp_ports.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exposed_port() {
        assert_eq!(parse_exposed_port(r#"{"3000/tcp":{}}"#), Some(3000));
        assert_eq!(
            parse_exposed_port(r#"{"8080/tcp":{},"9090/tcp":{}}"#),
            Some(8080)
        );
        assert_eq!(parse_exposed_port(r#"{"53/udp":{}}"#), None);
        assert_eq!(parse_exposed_port("null"), None);
        assert_eq!(parse_exposed_port(""), None);
    }
}
