//! Git command-line adapter.
//!
//! Shells out to `git` for every operation. Each job gets its own clone
//! under the configured workdir root, named after the job id, so jobs never
//! share a working copy.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{GitConfig, COMMIT_PREFIX};
use crate::domain::ports::{VcsError, VersionControl};
use crate::infrastructure::logging::scrub;
use crate::services::format_branch_name;

/// stderr fragments that mean the remote rejected our credentials.
const PERMISSION_MARKERS: [&str; 5] = [
    "error: 403",
    "403 forbidden",
    "permission denied",
    "permission to",
    "authentication failed",
];

pub struct GitCli {
    workdir_root: PathBuf,
    token: Option<String>,
    author_name: String,
    author_email: String,
    remote: String,
}

impl GitCli {
    pub fn new(workdir_root: impl Into<PathBuf>, config: &GitConfig) -> Self {
        Self {
            workdir_root: workdir_root.into(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
            remote: config.remote.clone(),
        }
    }

    /// Clone URL with the token injected into `https://` URLs.
    fn authenticated_url(&self, url: &str) -> String {
        match (&self.token, url.strip_prefix("https://")) {
            (Some(token), Some(rest)) if !rest.contains('@') => format!("https://{token}@{rest}"),
            _ => url.to_string(),
        }
    }

    async fn git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, VcsError> {
        let mut command = Command::new("git");
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        let output = command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        Err(failure(
            args.first().copied().unwrap_or_default(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

/// Turn a failed git invocation into an error, scrubbing credentials and
/// singling out authorisation failures.
fn failure(command: &str, stderr: &str) -> VcsError {
    let stderr = scrub(stderr.trim());
    let lowered = stderr.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return VcsError::PermissionDenied(stderr);
    }
    VcsError::CommandFailed {
        command: command.to_string(),
        stderr,
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip(self, url), fields(url = %scrub(url)))]
    async fn clone_repo(&self, url: &str, job_id: Uuid) -> Result<PathBuf, VcsError> {
        let target = self.workdir_root.join(job_id.to_string());
        if tokio::fs::try_exists(&target).await? {
            debug!(path = %target.display(), "Removing stale working copy");
            self.cleanup(&target).await?;
        }
        tokio::fs::create_dir_all(&self.workdir_root).await?;

        let target_arg = target.to_string_lossy().into_owned();
        let authenticated = self.authenticated_url(url);
        self.git(None, &["clone", "--quiet", &authenticated, &target_arg])
            .await?;
        info!(path = %target.display(), "Cloned repository");
        Ok(target)
    }

    async fn setup_branch(&self, path: &Path, team: &str, leader: &str) -> Result<String, VcsError> {
        let branch = format_branch_name(team, leader);
        self.git(Some(path), &["checkout", "-B", &branch]).await?;
        info!(%branch, "Checked out fix branch");
        Ok(branch)
    }

    async fn commit_fix(&self, path: &Path, message: &str) -> Result<bool, VcsError> {
        self.git(Some(path), &["add", "-u"]).await?;
        let status = self
            .git(Some(path), &["status", "--porcelain", "--untracked-files=no"])
            .await?;
        if status.trim().is_empty() {
            debug!("Nothing to commit");
            return Ok(false);
        }

        let full_message = format!("{COMMIT_PREFIX}{message}");
        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git(
            Some(path),
            &["-c", &name, "-c", &email, "commit", "--quiet", "-m", &full_message],
        )
        .await?;
        Ok(true)
    }

    async fn push(&self, path: &Path, branch_name: &str) -> Result<(), VcsError> {
        self.git(Some(path), &["push", "--force", &self.remote, branch_name])
            .await?;
        info!(branch = %branch_name, "Pushed fix branch");
        Ok(())
    }

    async fn cleanup(&self, path: &Path) -> Result<(), VcsError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || remove_tree(&owned))
            .await
            .map_err(|e| VcsError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

/// Recursive removal that retries once after clearing read-only bits
/// (git pack files are read-only on some platforms).
fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Retrying removal after clearing read-only bits");
            for entry in walkdir::WalkDir::new(path).into_iter().filter_map(Result::ok) {
                if let Ok(metadata) = entry.metadata() {
                    let mut permissions = metadata.permissions();
                    if permissions.readonly() {
                        #[allow(clippy::permissions_set_readonly_false)]
                        permissions.set_readonly(false);
                        let _ = std::fs::set_permissions(entry.path(), permissions);
                    }
                }
            }
            std::fs::remove_dir_all(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(root: &Path, token: Option<&str>) -> GitCli {
        let config = GitConfig {
            token: token.map(str::to_string),
            ..GitConfig::default()
        };
        GitCli::new(root, &config)
    }

    async fn run(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// A local repository with one tracked file, usable as a clone source.
    async fn origin_repo(dir: &Path) {
        run(dir, &["init", "--quiet"]).await;
        std::fs::write(dir.join("calc.py"), "def add(a, b):\n    return a - b\n").unwrap();
        run(dir, &["add", "."]).await;
        run(
            dir,
            &["-c", "user.name=t", "-c", "user.email=t@t", "commit", "--quiet", "-m", "init"],
        )
        .await;
    }

    #[test]
    fn test_token_injection() {
        let root = Path::new("/tmp");
        assert_eq!(
            cli(root, Some("tok")).authenticated_url("https://github.com/o/r.git"),
            "https://tok@github.com/o/r.git"
        );
        assert_eq!(
            cli(root, None).authenticated_url("https://github.com/o/r.git"),
            "https://github.com/o/r.git"
        );
        assert_eq!(
            cli(root, Some("tok")).authenticated_url("git@github.com:o/r.git"),
            "git@github.com:o/r.git"
        );
    }

    #[test]
    fn test_failure_classification() {
        let denied = failure(
            "push",
            "remote: Permission to o/r.git denied to bot.\nfatal: unable to access 'https://ghp_abcdefghijklmnopqrstuvwxyz12@github.com/o/r.git/': The requested URL returned error: 403",
        );
        match denied {
            VcsError::PermissionDenied(detail) => assert!(!detail.contains("ghp_")),
            other => panic!("unexpected {other:?}"),
        }

        let failed = failure("checkout", "error: pathspec 'x' did not match");
        assert!(matches!(failed, VcsError::CommandFailed { ref command, .. } if command == "checkout"));
    }

    #[tokio::test]
    async fn test_clone_branch_commit_cleanup() {
        let origin = tempfile::tempdir().unwrap();
        origin_repo(origin.path()).await;
        let work = tempfile::tempdir().unwrap();
        let git = cli(work.path(), None);

        let job_id = Uuid::new_v4();
        let path = git
            .clone_repo(&origin.path().to_string_lossy(), job_id)
            .await
            .unwrap();
        assert_eq!(path, work.path().join(job_id.to_string()));

        let branch = git.setup_branch(&path, "Team 1!", "jane doe").await.unwrap();
        assert_eq!(branch, "TEAM_1_JANE_DOE_AI_Fix");

        assert!(!git.commit_fix(&path, "nothing").await.unwrap());

        std::fs::write(path.join("calc.py"), "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::write(path.join("untracked.txt"), "ignored").unwrap();
        assert!(git.commit_fix(&path, "LOGIC error in calc.py line 2 → Fixed: add").await.unwrap());

        let log = git.git(Some(&path), &["log", "-1", "--format=%s|%an"]).await.unwrap();
        assert_eq!(log.trim(), "[AI-AGENT] LOGIC error in calc.py line 2 → Fixed: add|fixloop-agent");

        git.cleanup(&path).await.unwrap();
        assert!(!path.exists());
        git.cleanup(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_clone_failure_is_command_failed() {
        let work = tempfile::tempdir().unwrap();
        let missing = work.path().join("no-such-origin");
        let err = cli(work.path(), None)
            .clone_repo(&missing.to_string_lossy(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::CommandFailed { .. }));
    }
}
