use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{instrument, warn};

use super::{combined_output, unwrap_shell_command};
use crate::domain::ports::{Sandbox, SandboxRequest, SandboxResult};

/// Runs the test command directly on the host, inside the working copy.
///
/// `image` and `working_dir` are ignored; the command runs from `mount`.
#[derive(Debug, Clone, Default)]
pub struct LocalSandbox;

impl LocalSandbox {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self, request), fields(mount = %request.mount.display()))]
    async fn execute(&self, request: &SandboxRequest) -> SandboxResult {
        let command = unwrap_shell_command(&request.command);
        let run = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&request.mount)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match timeout(request.timeout, run).await {
            Ok(Ok(output)) => {
                SandboxResult::completed(output.status.code().unwrap_or(-1), combined_output(&output))
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Failed to start local test command");
                SandboxResult::infra_failure(format!("Failed to start test command: {err}"))
            }
            Err(_) => {
                warn!(timeout_secs = request.timeout.as_secs(), "Local test command timed out");
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
    use std::time::Duration;

    fn request(dir: &std::path::Path, command: &str, timeout: Duration) -> SandboxRequest {
        SandboxRequest {
            image: "unused".to_string(),
            command: command.to_string(),
            mount: dir.to_path_buf(),
            working_dir: "/app".to_string(),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_runs_in_working_copy_and_captures_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "present").unwrap();

        let result = LocalSandbox::new()
            .execute(&request(
                dir.path(),
                "sh -c 'cat marker.txt; echo oops >&2; exit 3'",
                Duration::from_secs(10),
            ))
            .await;

        assert!(!result.success);
        assert!(!result.infra_error);
        assert_eq!(result.exit_code, 3);
        assert!(result.logs.contains("present"));
        assert!(result.logs.contains("oops"));
    }

    #[tokio::test]
    async fn test_timeout_is_infra_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalSandbox::new()
            .execute(&request(dir.path(), "sleep 5", Duration::from_millis(200)))
            .await;
        assert!(result.infra_error);
        assert!(result.logs.contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_infra_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let result = LocalSandbox::new()
            .execute(&request(&missing, "true", Duration::from_secs(5)))
            .await;
        assert!(result.infra_error);
    }
}
