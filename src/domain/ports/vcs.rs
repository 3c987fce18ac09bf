//! Version control port - working copy lifecycle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Version control errors
#[derive(Debug, Error)]
pub enum VcsError {
    /// The remote refused the credentials (e.g. HTTP 403 on push)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for version control adapters.
///
/// All paths are job-scoped working copies; implementations must never
/// touch anything outside the directory returned by `clone_repo`.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `url` into a fresh directory unique to `job_id`.
    async fn clone_repo(&self, url: &str, job_id: Uuid) -> Result<PathBuf, VcsError>;

    /// Create (or reset) the fix branch and check it out. Returns its name.
    async fn setup_branch(&self, path: &Path, team: &str, leader: &str)
        -> Result<String, VcsError>;

    /// Stage tracked modifications and commit them.
    ///
    /// Returns `true` when a commit was created, `false` when there was
    /// nothing to commit.
    async fn commit_fix(&self, path: &Path, message: &str) -> Result<bool, VcsError>;

    /// Push the branch to the remote.
    ///
    /// Authorisation failures surface as [`VcsError::PermissionDenied`].
    async fn push(&self, path: &Path, branch_name: &str) -> Result<(), VcsError>;

    /// Remove the working copy.
    async fn cleanup(&self, path: &Path) -> Result<(), VcsError>;
}
