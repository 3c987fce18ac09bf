use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{combined_output, unwrap_shell_command, LocalSandbox, DOCKER_RUN_ERROR_EXIT_CODE};
use crate::domain::ports::{Sandbox, SandboxRequest, SandboxResult};

/// Runs the test command in a throwaway container with the working copy
/// bind-mounted at the request's working directory.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    docker_bin: String,
    local_fallback: Option<LocalSandbox>,
}

impl Default for DockerSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerSandbox {
    pub fn new() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            local_fallback: None,
        }
    }

    /// Run on the host when the docker binary cannot be started.
    #[must_use]
    pub fn with_local_fallback(mut self, fallback: LocalSandbox) -> Self {
        self.local_fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_binary(mut self, docker_bin: impl Into<String>) -> Self {
        self.docker_bin = docker_bin.into();
        self
    }

    fn run_args(&self, request: &SandboxRequest, container: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            container.to_string(),
            "-v".to_string(),
            format!("{}:{}", request.mount.display(), request.working_dir),
            "-w".to_string(),
            request.working_dir.clone(),
            request.image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            unwrap_shell_command(&request.command),
        ]
    }

    async fn remove_container(&self, container: &str) {
        let removed = Command::new(&self.docker_bin)
            .args(["rm", "-f", container])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(err) = removed {
            warn!(error = %err, container, "Failed to remove timed out container");
        }
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn name(&self) -> &'static str {
        "docker"
    }

    #[instrument(skip(self, request), fields(image = %request.image))]
    async fn execute(&self, request: &SandboxRequest) -> SandboxResult {
        let container = format!("fixloop-{}", Uuid::new_v4().simple());
        let run = Command::new(&self.docker_bin)
            .args(self.run_args(request, &container))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match timeout(request.timeout, run).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let logs = combined_output(&output);
                if exit_code == DOCKER_RUN_ERROR_EXIT_CODE {
                    warn!("docker run failed before the test command started");
                    SandboxResult::infra_failure(logs)
                } else {
                    SandboxResult::completed(exit_code, logs)
                }
            }
            Ok(Err(err)) => match &self.local_fallback {
                Some(local) => {
                    info!(error = %err, "Docker unavailable, running tests locally");
                    local.execute(request).await
                }
                None => SandboxResult::infra_failure(format!("Failed to start docker: {err}")),
            },
            Err(_) => {
                warn!(timeout_secs = request.timeout.as_secs(), "Container timed out");
                self.remove_container(&container).await;
                SandboxResult::infra_failure(format!(
                    "Test execution timed out after {}s",
                    request.timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn request(mount: PathBuf) -> SandboxRequest {
        SandboxRequest {
            image: "python:3.9-slim".to_string(),
            command: "sh -c 'echo from-sandbox'".to_string(),
            mount,
            working_dir: "/app".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_run_args_mount_and_unwrap() {
        let args = DockerSandbox::new().run_args(&request(PathBuf::from("/tmp/job")), "fixloop-x");
        assert_eq!(
            args,
            vec![
                "run", "--rm", "--name", "fixloop-x", "-v", "/tmp/job:/app", "-w", "/app",
                "python:3.9-slim", "sh", "-c", "echo from-sandbox",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_without_fallback_is_infra_error() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = DockerSandbox::new().with_binary("fixloop-no-such-docker");
        let result = sandbox.execute(&request(dir.path().to_path_buf())).await;
        assert!(result.infra_error);
        assert!(result.logs.contains("Failed to start docker"));
    }

    #[tokio::test]
    async fn test_missing_binary_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = DockerSandbox::new()
            .with_binary("fixloop-no-such-docker")
            .with_local_fallback(LocalSandbox::new());
        let result = sandbox.execute(&request(dir.path().to_path_buf())).await;
        assert!(result.success);
        assert!(result.logs.contains("from-sandbox"));
    }
}
