use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::JobState;

/// Repository interface for job state.
///
/// Writers replace a job's state wholesale, so readers only ever see a
/// complete snapshot.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `JobAlreadyExists` on id collision.
    async fn insert(&self, job: JobState) -> DomainResult<()>;

    /// Replace the stored snapshot of an existing job.
    async fn put(&self, job: JobState) -> DomainResult<()>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> DomainResult<Option<JobState>>;

    /// All known jobs, oldest first.
    async fn list(&self) -> DomainResult<Vec<JobState>>;
}
