//! Job submission and status queries.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::application::RepairController;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JobState, RunRequest};
use crate::domain::ports::JobStore;

/// Front door for repair jobs.
///
/// Each accepted job runs as its own tokio task; the store is the only
/// thing shared between the task and callers.
pub struct JobService {
    store: Arc<dyn JobStore>,
    controller: Arc<RepairController>,
    default_retry_limit: u32,
    max_retry_limit: u32,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        controller: Arc<RepairController>,
        default_retry_limit: u32,
        max_retry_limit: u32,
    ) -> Self {
        Self {
            store,
            controller,
            default_retry_limit,
            max_retry_limit,
        }
    }

    /// Validate `request`, record a QUEUED job and start it in the background.
    #[instrument(skip(self, request), fields(repo = %request.repository_url))]
    pub async fn submit(&self, request: RunRequest) -> DomainResult<Uuid> {
        let retry_limit = self.validate(&request)?;

        let job_id = Uuid::new_v4();
        let job = JobState::new(job_id, request.repository_url.trim(), retry_limit);
        self.store.insert(job.clone()).await?;
        info!(%job_id, retry_limit, "Job queued");

        let controller = Arc::clone(&self.controller);
        let task = tokio::spawn(async move {
            controller.run(job, &request).await;
        });

        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            if let Err(err) = task.await {
                let reason = if err.is_panic() {
                    format!("Repair task panicked: {}", panic_message(err.into_panic()))
                } else {
                    format!("Repair task stopped: {err}")
                };
                error!(%job_id, reason = %reason, "Repair task died");
                controller.recover(job_id, &reason).await;
            }
        });

        Ok(job_id)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, job_id: Uuid) -> DomainResult<JobState> {
        self.store
            .get(job_id)
            .await?
            .ok_or(DomainError::JobNotFound(job_id))
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_for_terminal(&self, job_id: Uuid, poll: Duration) -> DomainResult<JobState> {
        loop {
            let job = self.status(job_id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn list(&self) -> DomainResult<Vec<JobState>> {
        self.store.list().await
    }

    fn validate(&self, request: &RunRequest) -> DomainResult<u32> {
        for (field, value) in [
            ("repository_url", &request.repository_url),
            ("team_name", &request.team_name),
            ("leader_name", &request.leader_name),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::ValidationFailed(format!("{field} must not be empty")));
            }
        }

        let retry_limit = request.retry_limit.unwrap_or(self.default_retry_limit);
        if retry_limit == 0 || retry_limit > self.max_retry_limit {
            return Err(DomainError::ValidationFailed(format!(
                "retry_limit must be between 1 and {}, got {retry_limit}",
                self.max_retry_limit
            )));
        }
        Ok(retry_limit)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
