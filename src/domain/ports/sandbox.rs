//! Sandbox port - isolated test execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Exit code conventionally used by pytest when nothing was collected.
pub const NO_TESTS_EXIT_CODE: i32 = 5;

/// What to run and where.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    /// Container image (ignored by sandboxes that run on the host)
    pub image: String,

    /// Shell command, run through `sh -c`
    pub command: String,

    /// Host directory holding the working copy
    pub mount: PathBuf,

    /// Working directory inside the sandbox
    pub working_dir: String,

    pub timeout: Duration,
}

/// Outcome of one sandboxed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxResult {
    /// Exit code was zero
    pub success: bool,

    /// Exit code of the command, -1 when it never produced one
    pub exit_code: i32,

    /// Combined stdout and stderr
    pub logs: String,

    /// The sandbox itself failed; says nothing about the tests
    pub infra_error: bool,
}

impl SandboxResult {
    pub fn completed(exit_code: i32, logs: impl Into<String>) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            logs: logs.into(),
            infra_error: false,
        }
    }

    pub fn infra_failure(logs: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: -1,
            logs: logs.into(),
            infra_error: true,
        }
    }

    /// Whether the run indicates that no tests could be discovered.
    pub fn found_no_tests(&self) -> bool {
        let lower = self.logs.to_lowercase();
        lower.contains("collected 0 items")
            || lower.contains("no tests ran")
            || lower.contains("no test framework detected")
            || self.exit_code == NO_TESTS_EXIT_CODE
    }
}

/// Trait for test sandboxes.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Sandbox type name.
    fn name(&self) -> &'static str;

    /// Run the command. Never fails: sandbox breakage is reported through
    /// [`SandboxResult::infra_error`].
    async fn execute(&self, request: &SandboxRequest) -> SandboxResult;
}
