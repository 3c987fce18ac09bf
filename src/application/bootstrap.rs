//! Wiring: build the job service from configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::repair_loop::{RepairController, RepairSettings};
use crate::adapters::completion::{shared_rate_limiter, GeminiClient};
use crate::adapters::{DockerSandbox, FsStackAnalyzer, GitCli, InMemoryJobStore, LocalSandbox};
use crate::domain::models::{CompletionRole, Config, SandboxKind};
use crate::domain::ports::{CompletionService, JobStore, Sandbox};
use crate::services::{
    CompletionClassifier, CompletionFixer, CompletionJudge, ContinuationOracle, ErrorClassifier,
    FixEngine, JobService,
};

/// Build a [`JobService`] backed by the real adapters.
///
/// Completion-backed strategies are always installed; each one probes its
/// own key at call time and steps aside when it has none.
pub fn build_job_service(config: &Config) -> Result<JobService> {
    let limiter = shared_rate_limiter(&config.completion);
    let client = |role| -> Result<Arc<dyn CompletionService>> {
        let client = GeminiClient::new(&config.completion, role, Arc::clone(&limiter))
            .context("Failed to build completion HTTP client")?;
        Ok(Arc::new(client))
    };

    let sandbox: Arc<dyn Sandbox> = match config.sandbox.kind {
        SandboxKind::Docker if config.sandbox.local_fallback => {
            Arc::new(DockerSandbox::new().with_local_fallback(LocalSandbox::new()))
        }
        SandboxKind::Docker => Arc::new(DockerSandbox::new()),
        SandboxKind::Local => Arc::new(LocalSandbox::new()),
    };
    info!(sandbox = sandbox.name(), "Configured test sandbox");

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let controller = RepairController::new(
        Arc::new(GitCli::new(&config.repair.workdir_root, &config.git)),
        sandbox,
        Arc::new(FsStackAnalyzer::new()),
        Arc::clone(&store),
        RepairSettings::from(config),
    )
    .with_classifier(ErrorClassifier::with_enhanced(Arc::new(
        CompletionClassifier::new(client(CompletionRole::Classifier)?),
    )))
    .with_fix_engine(FixEngine::with_enhanced(Arc::new(CompletionFixer::new(
        client(CompletionRole::Fixer)?,
    ))))
    .with_oracle(ContinuationOracle::with_judge(Arc::new(CompletionJudge::new(
        client(CompletionRole::Verifier)?,
    ))));

    Ok(JobService::new(
        store,
        Arc::new(controller),
        config.repair.default_retry_limit,
        config.repair.max_retry_limit,
    ))
}
