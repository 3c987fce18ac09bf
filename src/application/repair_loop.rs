//! RepairController - the iteration state machine
//!
//! Drives one job from QUEUED to a terminal state:
//! - clone, branch and analyse the working copy
//! - run tests, classify failures, apply fixes, commit
//! - stop on success, no progress, an exhausted budget or an oracle veto
//! - score, push and write `results.json`
//!
//! The working copy is removed when the job ends, whatever the outcome.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::domain::models::{
    Config, ErrorRecord, FixRecord, FixStatus, JobState, JobStatus, RunRequest, RunResults,
    StackInfo,
};
use crate::domain::ports::{
    JobStore, Sandbox, SandboxRequest, StackAnalyzer, VcsError, VersionControl,
};
use crate::services::{score, ContinuationOracle, ErrorClassifier, FixEngine};

/// Name of the artifact written into the working copy on completion.
pub const RESULTS_FILE: &str = "results.json";

static SOURCE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"source function: (\w+)").expect("source function pattern is valid")
});

/// Runtime knobs for the controller.
#[derive(Debug, Clone)]
pub struct RepairSettings {
    pub sandbox_timeout: Duration,
    /// Where the working copy appears inside the sandbox
    pub mount_point: String,
    pub keep_workdir: bool,
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            sandbox_timeout: Duration::from_secs(300),
            mount_point: "/app".to_string(),
            keep_workdir: false,
        }
    }
}

impl From<&Config> for RepairSettings {
    fn from(config: &Config) -> Self {
        Self {
            sandbox_timeout: Duration::from_secs(config.sandbox.timeout_secs),
            mount_point: config.sandbox.mount_point.clone(),
            keep_workdir: config.repair.keep_workdir,
        }
    }
}

/// Per-run bookkeeping that never leaves the controller.
#[derive(Debug, Default)]
struct RunLedger {
    /// `file:line` keys already annotated in this run
    annotated: HashSet<String>,
    /// Commits actually created
    commits: u32,
}

/// Outcome of handling one error record.
struct FixAttempt {
    written: bool,
}

pub struct RepairController {
    vcs: Arc<dyn VersionControl>,
    sandbox: Arc<dyn Sandbox>,
    analyzer: Arc<dyn StackAnalyzer>,
    store: Arc<dyn JobStore>,
    classifier: Arc<ErrorClassifier>,
    fix_engine: Arc<FixEngine>,
    oracle: Arc<ContinuationOracle>,
    settings: RepairSettings,
    /// Working copies of jobs still in flight
    workdirs: Mutex<HashMap<Uuid, PathBuf>>,
}

impl RepairController {
    /// Controller with the deterministic strategies only.
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        sandbox: Arc<dyn Sandbox>,
        analyzer: Arc<dyn StackAnalyzer>,
        store: Arc<dyn JobStore>,
        settings: RepairSettings,
    ) -> Self {
        Self {
            vcs,
            sandbox,
            analyzer,
            store,
            classifier: Arc::new(ErrorClassifier::rules_only()),
            fix_engine: Arc::new(FixEngine::annotation_only()),
            oracle: Arc::new(ContinuationOracle::rules_only()),
            settings,
            workdirs: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    #[must_use]
    pub fn with_fix_engine(mut self, fix_engine: FixEngine) -> Self {
        self.fix_engine = Arc::new(fix_engine);
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: ContinuationOracle) -> Self {
        self.oracle = Arc::new(oracle);
        self
    }

    /// Run `job` to a terminal state and return its final snapshot.
    ///
    /// Never fails: anything unexpected moves the job to `ERROR` with the
    /// diagnostic appended to its raw logs.
    #[instrument(skip(self, job, request), fields(job_id = %job.job_id))]
    pub async fn run(&self, mut job: JobState, request: &RunRequest) -> JobState {
        let started = Instant::now();

        if let Err(err) = self.drive(&mut job, request, started).await {
            error!(error = %format!("{err:#}"), "Repair loop failed");
            self.abort(&mut job, &format!("\nCritical Error: {err:#}\n"))
                .await;
        }

        if job.status == JobStatus::Error {
            job.total_time_seconds = round_seconds(started.elapsed());
        }

        self.release_workdir(job.job_id).await;
        self.publish(&job).await;
        info!(status = %job.status, score = job.score, "Job ended");
        job
    }

    /// Settle a job whose task died without reaching a terminal state.
    ///
    /// The last published snapshot is moved to `ERROR` with `reason` in its
    /// raw logs, and the working copy is released.
    #[instrument(skip(self, reason))]
    pub async fn recover(&self, job_id: Uuid, reason: &str) {
        self.release_workdir(job_id).await;
        match self.store.get(job_id).await {
            Ok(Some(mut job)) if !job.is_terminal() => {
                self.abort(&mut job, &format!("\nCritical Error: {reason}\n"))
                    .await;
            }
            Ok(Some(_)) => debug!("Job already terminal"),
            Ok(None) => warn!("No snapshot to recover"),
            Err(err) => warn!(error = %err, "Failed to load job snapshot"),
        }
    }

    async fn release_workdir(&self, job_id: Uuid) {
        let Some(path) = self.workdirs.lock().await.remove(&job_id) else {
            return;
        };
        if self.settings.keep_workdir {
            info!(path = %path.display(), "Keeping working copy");
        } else if let Err(err) = self.vcs.cleanup(&path).await {
            warn!(error = %err, path = %path.display(), "Failed to remove working copy");
        }
    }

    async fn drive(
        &self,
        job: &mut JobState,
        request: &RunRequest,
        started: Instant,
    ) -> Result<()> {
        job.transition_to(JobStatus::Running)?;
        self.publish(job).await;

        let path = self
            .vcs
            .clone_repo(&request.repository_url, job.job_id)
            .await
            .context("Failed to clone repository")?;
        self.workdirs.lock().await.insert(job.job_id, path.clone());

        job.branch_name = self
            .vcs
            .setup_branch(&path, &request.team_name, &request.leader_name)
            .await
            .context("Failed to set up fix branch")?;

        let stack = self
            .analyzer
            .analyze(&path)
            .await
            .context("Failed to analyse repository")?;
        info!(language = %stack.language, image = %stack.container_image, "Analyzed stack");
        job.append_log(&format!("Analyzed stack: {}\n", stack.language));
        self.publish(job).await;

        let mut ledger = RunLedger::default();
        let mut outcome = JobStatus::Finished;

        for iteration in 1..=job.retry_limit {
            info!(iteration, retry_limit = job.retry_limit, "Starting iteration");
            job.iterations_used = iteration;
            job.transition_to(JobStatus::Running)?;
            job.record_timeline(iteration, JobStatus::Running);
            self.publish(job).await;

            let result = self.sandbox.execute(&self.sandbox_request(&stack, &path)).await;
            job.append_log(&format!("Iteration {iteration} Logs:\n{}\n", result.logs));

            if result.infra_error {
                error!(iteration, "Sandbox infrastructure failure");
                self.abort(job, &format!("\nInfra Error: {}\n", result.logs))
                    .await;
                return self.salvage(job, &path, started, ledger.commits).await;
            }

            if result.found_no_tests() {
                error!(iteration, "No tests discovered");
                self.abort(
                    job,
                    "\nNo test files were discovered. Ensure test files follow naming conventions (test_*.py, *.test.js, etc.)\n",
                )
                .await;
                return self.salvage(job, &path, started, ledger.commits).await;
            }

            let mut errors = self.classifier.classify(&result.logs).await;
            if !result.success && errors.is_empty() {
                warn!(exit_code = result.exit_code, "Failing run produced no parseable errors");
                errors.push(ErrorRecord::unparsed_failure(result.exit_code));
            }
            job.failures_detected += errors.len() as u32;

            if result.success && errors.is_empty() {
                outcome = JobStatus::Passed;
                break;
            }

            job.transition_to(JobStatus::Fixing)?;
            job.record_timeline(iteration, JobStatus::Fixing);
            self.publish(job).await;

            let mut progress = 0u32;
            for error in &errors {
                let attempt = self
                    .fix_error(job, &path, error, &result.logs, &mut ledger)
                    .await?;
                if attempt.is_some_and(|a| a.written) {
                    job.fixes_applied += 1;
                    progress += 1;
                }
            }
            self.publish(job).await;

            if progress == 0 {
                info!(iteration, "No new fixes applied, stopping");
                break;
            }

            if !self
                .oracle
                .should_continue(errors.len() as u32, iteration, job.retry_limit)
                .await
            {
                break;
            }
        }

        self.finalize(job, &path, outcome, started, ledger.commits).await
    }

    /// Handle one error record. `None` when its location was already
    /// annotated earlier in this run.
    #[instrument(skip_all, fields(file = %error.file, line = error.line, bug_type = %error.bug_type))]
    async fn fix_error(
        &self,
        job: &mut JobState,
        workdir: &Path,
        error: &ErrorRecord,
        logs: &str,
        ledger: &mut RunLedger,
    ) -> Result<Option<FixAttempt>> {
        let target = self.resolve_target(workdir, error).await;
        let dedup_key = format!("{}:{}", target, error.line);
        if ledger.annotated.contains(&dedup_key) {
            debug!(key = %dedup_key, "Location already annotated, skipping");
            return Ok(None);
        }

        let file_path = workdir_path(workdir, &self.settings.mount_point, &target);
        let exists = match &file_path {
            Some(p) => tokio::fs::metadata(p).await.is_ok_and(|m| m.is_file()),
            None => false,
        };

        let original = match (&file_path, exists) {
            (Some(p), true) => {
                let bytes = tokio::fs::read(p)
                    .await
                    .with_context(|| format!("Failed to read {}", p.display()))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            _ => String::new(),
        };

        let resolved = error.retargeted(target.clone());
        let outcome = self.fix_engine.apply_fix(&resolved, &original, logs).await;
        if outcome.rejected_rewrite {
            job.append_log(&format!("Safety: Rejected oversized AI rewrite for {target}\n"));
        }

        let mut written = false;
        if let (Some(p), true) = (&file_path, exists) {
            tokio::fs::write(p, &outcome.new_content)
                .await
                .with_context(|| format!("Failed to write {}", p.display()))?;
            written = true;
            if !outcome.ai_fixed {
                ledger.annotated.insert(dedup_key);
            }
            info!(ai_fixed = outcome.ai_fixed, "{}", outcome.commit_message);
        } else {
            debug!(target = %target, "Target file not found in working copy");
        }

        if self
            .vcs
            .commit_fix(workdir, &outcome.commit_message)
            .await
            .context("Failed to commit fix")?
        {
            ledger.commits += 1;
        }

        job.fixes.push(FixRecord::new(
            target,
            error.bug_type,
            error.line,
            &outcome.commit_message,
            FixStatus::from_attempt(written, outcome.ai_fixed),
        ));

        Ok(Some(FixAttempt { written }))
    }

    /// Redirect assertion failures reported in a test file to the source file
    /// defining the function under test, when one can be found.
    async fn resolve_target(&self, workdir: &Path, error: &ErrorRecord) -> String {
        let Some(function) = SOURCE_FUNCTION
            .captures(&error.message)
            .map(|caps| caps[1].to_string())
        else {
            return error.file.clone();
        };
        if !is_test_file(&error.file) {
            return error.file.clone();
        }

        let root = workdir.to_path_buf();
        let search = function.clone();
        match tokio::task::spawn_blocking(move || find_function_definition(&root, &search)).await {
            Ok(Some(found)) => {
                info!(from = %error.file, to = %found, function = %function, "Resolved fix target");
                found
            }
            Ok(None) => error.file.clone(),
            Err(err) => {
                warn!(error = %err, "Source search task failed");
                error.file.clone()
            }
        }
    }

    async fn finalize(
        &self,
        job: &mut JobState,
        workdir: &Path,
        outcome: JobStatus,
        started: Instant,
        commits: u32,
    ) -> Result<()> {
        job.total_time_seconds = round_seconds(started.elapsed());
        job.score = score(
            job.failures_detected,
            job.fixes_applied,
            job.iterations_used,
            job.total_time_seconds,
            commits,
        );

        match self.vcs.push(workdir, &job.branch_name).await {
            Ok(()) => {}
            Err(VcsError::PermissionDenied(detail)) => {
                error!("Push rejected: permission denied");
                self.abort(
                    job,
                    &format!(
                        "\nPush rejected for branch {}: {detail}. Grant the configured token write access to the repository, or fork it and submit the fork.\n",
                        job.branch_name
                    ),
                )
                .await;
                return Ok(());
            }
            Err(err) => return Err(err).context("Failed to push fix branch"),
        }

        job.transition_to(outcome)?;
        job.record_timeline(job.iterations_used, outcome);
        self.publish(job).await;

        self.write_results(job, workdir).await
    }

    /// Keep the fixes committed before a fatal error: push the branch and
    /// write `results.json`. The job stays in `ERROR`.
    async fn salvage(
        &self,
        job: &mut JobState,
        workdir: &Path,
        started: Instant,
        commits: u32,
    ) -> Result<()> {
        if commits == 0 {
            return Ok(());
        }

        job.total_time_seconds = round_seconds(started.elapsed());
        job.score = score(
            job.failures_detected,
            job.fixes_applied,
            job.iterations_used,
            job.total_time_seconds,
            commits,
        );

        match self.vcs.push(workdir, &job.branch_name).await {
            Ok(()) => info!(commits, "Pushed fixes committed before the failure"),
            Err(err) => {
                warn!(error = %err, "Failed to push committed fixes");
                job.append_log(&format!("Failed to push committed fixes: {err}\n"));
            }
        }
        self.publish(job).await;

        self.write_results(job, workdir).await
    }

    async fn write_results(&self, job: &mut JobState, workdir: &Path) -> Result<()> {
        let results = serde_json::to_string_pretty(&RunResults::from(&*job))?;
        let results_path = workdir.join(RESULTS_FILE);
        if let Err(err) = tokio::fs::write(&results_path, results).await {
            warn!(error = %err, "Failed to write {RESULTS_FILE}");
            job.append_log(&format!("Failed to write {RESULTS_FILE}: {err}\n"));
        }
        Ok(())
    }

    fn sandbox_request(&self, stack: &StackInfo, workdir: &Path) -> SandboxRequest {
        SandboxRequest {
            image: stack.container_image.clone(),
            command: stack.test_command.clone(),
            mount: workdir.to_path_buf(),
            working_dir: self.settings.mount_point.clone(),
            timeout: self.settings.sandbox_timeout,
        }
    }

    async fn abort(&self, job: &mut JobState, diagnostic: &str) {
        job.fail(diagnostic);
        job.record_timeline(job.iterations_used, JobStatus::Error);
        self.publish(job).await;
    }

    async fn publish(&self, job: &JobState) {
        if let Err(err) = self.store.put(job.clone()).await {
            warn!(error = %err, "Failed to publish job snapshot");
        }
    }
}

fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

fn is_test_file(file: &str) -> bool {
    file.contains("test_") || file.contains("_test.")
}

/// Map a reported path onto the working copy.
///
/// Paths under the sandbox mount point are made relative; anything still
/// absolute or escaping the working copy is refused.
fn workdir_path(workdir: &Path, mount_point: &str, file: &str) -> Option<PathBuf> {
    let mount_prefix = format!("{}/", mount_point.trim_end_matches('/'));
    let relative = Path::new(file.strip_prefix(&mount_prefix).unwrap_or(file));

    let confined = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !confined || relative.as_os_str().is_empty() {
        return None;
    }
    Some(workdir.join(relative))
}

/// First non-test `.py` file (sorted walk, `.git` skipped) defining `function`,
/// relative to `root` with `/` separators.
fn find_function_definition(root: &Path, function: &str) -> Option<String> {
    let needle = format!("def {function}(");
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.ends_with(".py") && !name.starts_with("test_") && !name.contains("_test.")
        })
        .find(|entry| {
            std::fs::read(entry.path())
                .map(|bytes| String::from_utf8_lossy(&bytes).contains(&needle))
                .unwrap_or(false)
        })
        .and_then(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            Some(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workdir_path_strips_mount_point() {
        let root = Path::new("/tmp/job");
        assert_eq!(
            workdir_path(root, "/app", "/app/src/calc.py"),
            Some(PathBuf::from("/tmp/job/src/calc.py"))
        );
        assert_eq!(
            workdir_path(root, "/app/", "src/calc.py"),
            Some(PathBuf::from("/tmp/job/src/calc.py"))
        );
    }

    #[test]
    fn test_workdir_path_refuses_escapes() {
        let root = Path::new("/tmp/job");
        assert_eq!(workdir_path(root, "/app", "../etc/passwd"), None);
        assert_eq!(workdir_path(root, "/app", "/etc/passwd"), None);
        assert_eq!(workdir_path(root, "/app", ""), None);
    }

    #[test]
    fn test_find_function_definition_skips_tests_and_git() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("tests")).unwrap();
        std::fs::write(root.join(".git/hook.py"), "def add(a, b): pass\n").unwrap();
        std::fs::write(root.join("tests/test_calc.py"), "def add(a, b): pass\n").unwrap();
        std::fs::write(root.join("src/calc.py"), "def add(a, b):\n    return a - b\n").unwrap();
        std::fs::write(root.join("src/other.py"), "def add_all(xs): pass\n").unwrap();

        assert_eq!(find_function_definition(root, "add"), Some("src/calc.py".to_string()));
        assert_eq!(find_function_definition(root, "missing"), None);
    }

    #[test]
    fn test_round_seconds() {
        assert_eq!(round_seconds(Duration::from_millis(1234)), 1.23);
        assert_eq!(round_seconds(Duration::from_millis(1500)), 1.5);
    }
}
