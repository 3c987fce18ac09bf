//! Common test utilities for integration tests
//!
//! In-process fakes for the ports the repair loop drives, so the controller
//! can be exercised without git, docker or network access.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

use fixloop::adapters::InMemoryJobStore;
use fixloop::application::{RepairController, RepairSettings};
use fixloop::domain::errors::DomainResult;
use fixloop::domain::models::{ErrorRecord, StackInfo};
use fixloop::domain::ports::{
    JobStore, Sandbox, SandboxRequest, SandboxResult, StackAnalyzer, VcsError, VersionControl,
};
use fixloop::format_branch_name;
use fixloop::services::{Rewrite, RewriteStrategy};

/// Logs of a failing run with a syntax error at `app.py` line 1.
pub const SYNTAX_FAILURE_LOGS: &str = "\
============================= test session starts ==============================
collected 1 item

  File \"app.py\", line 1
    def add(a, b)
                 ^
SyntaxError: expected ':'
=========================== 1 error in 0.05s ===========================
";

/// Logs of a failing run with an indentation error at the same `app.py` line 1.
pub const INDENTATION_FAILURE_LOGS: &str = "\
  File \"app.py\", line 1
    def add(a, b)
IndentationError: unexpected indent
1 error in 0.04s
";

pub const PASSING_LOGS: &str = "tests/test_app.py::test_add PASSED\n1 passed in 0.01s\n";

/// Broken fixture used by most scenarios.
pub const BROKEN_APP: &str = "def add(a, b)\n    return a + b\n";

/// Sandbox replaying a script of results; the last entry repeats forever.
pub struct ScriptedSandbox {
    script: Vec<SandboxResult>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SandboxRequest>>,
}

impl ScriptedSandbox {
    pub fn new(script: Vec<SandboxResult>) -> Self {
        assert!(!script.is_empty(), "script needs at least one result");
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_then_passing() -> Self {
        Self::new(vec![
            SandboxResult::completed(1, SYNTAX_FAILURE_LOGS),
            SandboxResult::completed(0, PASSING_LOGS),
        ])
    }

    pub fn always(result: SandboxResult) -> Self {
        Self::new(vec![result])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SandboxRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, request: &SandboxRequest) -> SandboxResult {
        self.requests.lock().unwrap().push(request.clone());
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[idx.min(self.script.len() - 1)].clone()
    }
}

/// Version control fake that materialises a fixture into a temp directory
/// and records every call.
pub struct FakeVcs {
    root: TempDir,
    fixture: Vec<(String, String)>,
    pub fail_clone: bool,
    pub deny_push: bool,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<Vec<String>>,
    cleaned: Mutex<Vec<PathBuf>>,
}

impl FakeVcs {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            root: tempfile::tempdir().expect("Failed to create temp dir"),
            fixture: files
                .iter()
                .map(|(path, body)| ((*path).to_string(), (*body).to_string()))
                .collect(),
            fail_clone: false,
            deny_push: false,
            commits: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            cleaned: Mutex::new(Vec::new()),
        }
    }

    pub fn broken_app() -> Self {
        Self::with_files(&[("app.py", BROKEN_APP)])
    }

    pub fn workdir(&self, job_id: Uuid) -> PathBuf {
        self.root.path().join(job_id.to_string())
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn cleaned(&self) -> Vec<PathBuf> {
        self.cleaned.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn clone_repo(&self, url: &str, job_id: Uuid) -> Result<PathBuf, VcsError> {
        if self.fail_clone {
            return Err(VcsError::CommandFailed {
                command: "clone".to_string(),
                stderr: format!("fatal: repository '{url}' not found"),
            });
        }
        let dest = self.workdir(job_id);
        for (path, body) in &self.fixture {
            let file = dest.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(file, body)?;
        }
        std::fs::create_dir_all(&dest)?;
        Ok(dest)
    }

    async fn setup_branch(&self, _path: &Path, team: &str, leader: &str) -> Result<String, VcsError> {
        Ok(format_branch_name(team, leader))
    }

    async fn commit_fix(&self, _path: &Path, message: &str) -> Result<bool, VcsError> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok(true)
    }

    async fn push(&self, _path: &Path, branch_name: &str) -> Result<(), VcsError> {
        if self.deny_push {
            return Err(VcsError::PermissionDenied(
                "remote: Permission to acme/calc.git denied".to_string(),
            ));
        }
        self.pushes.lock().unwrap().push(branch_name.to_string());
        Ok(())
    }

    async fn cleanup(&self, path: &Path) -> Result<(), VcsError> {
        self.cleaned.lock().unwrap().push(path.to_path_buf());
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

/// Analyzer that always reports a python project.
pub struct PythonStack;

#[async_trait]
impl StackAnalyzer for PythonStack {
    async fn analyze(&self, _path: &Path) -> DomainResult<StackInfo> {
        Ok(StackInfo {
            language: "python".to_string(),
            test_command: "pytest -v --tb=long".to_string(),
            container_image: "python:3.9-slim".to_string(),
            project_root: ".".to_string(),
        })
    }
}

/// Rewrite strategy returning a canned replacement.
pub struct CannedRewrite {
    pub content: String,
    pub description: String,
    pub calls: AtomicUsize,
}

impl CannedRewrite {
    pub fn new(content: &str, description: &str) -> Self {
        Self {
            content: content.to_string(),
            description: description.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RewriteStrategy for CannedRewrite {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn rewrite(&self, _error: &ErrorRecord, _content: &str, _logs: &str) -> Option<Rewrite> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(Rewrite {
            content: self.content.clone(),
            description: self.description.clone(),
        })
    }
}

/// Everything a controller test needs to inspect afterwards.
pub struct Harness {
    pub vcs: Arc<FakeVcs>,
    pub sandbox: Arc<ScriptedSandbox>,
    pub store: Arc<InMemoryJobStore>,
}

impl Harness {
    pub fn new(vcs: FakeVcs, sandbox: ScriptedSandbox) -> Self {
        Self {
            vcs: Arc::new(vcs),
            sandbox: Arc::new(sandbox),
            store: Arc::new(InMemoryJobStore::new()),
        }
    }

    pub fn controller(&self, keep_workdir: bool) -> RepairController {
        RepairController::new(
            self.vcs.clone(),
            self.sandbox.clone(),
            Arc::new(PythonStack),
            self.store.clone() as Arc<dyn JobStore>,
            RepairSettings {
                keep_workdir,
                ..RepairSettings::default()
            },
        )
    }
}
