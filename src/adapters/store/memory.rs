use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::JobState;
use crate::domain::ports::JobStore;

/// Process-lifetime job table. Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobState>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: JobState) -> DomainResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(DomainError::JobAlreadyExists(job.job_id));
        }
        jobs.insert(job.job_id, job);
        Ok(())
    }

    async fn put(&self, job: JobState) -> DomainResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.job_id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(DomainError::JobNotFound(job.job_id)),
        }
    }

    async fn get(&self, job_id: Uuid) -> DomainResult<Option<JobState>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<JobState>> {
        let mut jobs: Vec<JobState> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}
