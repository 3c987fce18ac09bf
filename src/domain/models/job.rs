//! Repair job domain model.
//!
//! One `JobState` exists per submitted run. It is mutated only by the loop
//! that owns it and published to the job store as a whole snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fix::FixRecord;
use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle of a repair job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, loop not started yet
    #[default]
    Queued,
    /// Working copy prepared, tests executing
    Running,
    /// Failures found, fixes being applied
    Fixing,
    /// Test suite passes
    Passed,
    /// Loop stopped with failures remaining (budget or no progress)
    Finished,
    /// Infrastructure failure, no tests, or unexpected exception
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Fixing => "FIXING",
            Self::Passed => "PASSED",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Finished | Self::Error)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<JobStatus> {
        match self {
            Self::Queued => vec![Self::Running, Self::Error],
            Self::Running => vec![Self::Fixing, Self::Passed, Self::Finished, Self::Error],
            Self::Fixing => vec![Self::Running, Self::Passed, Self::Finished, Self::Error],
            Self::Passed | Self::Finished | Self::Error => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the job timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub iteration: u32,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
}

/// Submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub repository_url: String,
    pub team_name: String,
    pub leader_name: String,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub retry_limit: Option<u32>,
}

impl RunRequest {
    pub fn new(
        repository_url: impl Into<String>,
        team_name: impl Into<String>,
        leader_name: impl Into<String>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            team_name: team_name.into(),
            leader_name: leader_name.into(),
            retry_limit: None,
        }
    }

    #[must_use]
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }
}

/// Full state of a repair job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: Uuid,
    pub repo_url: String,
    pub branch_name: String,
    pub failures_detected: u32,
    pub fixes_applied: u32,
    pub iterations_used: u32,
    pub retry_limit: u32,
    pub total_time_seconds: f64,
    pub status: JobStatus,
    pub score: f64,
    pub fixes: Vec<FixRecord>,
    pub timeline: Vec<TimelineEvent>,
    pub raw_logs: String,
    pub created_at: DateTime<Utc>,
}

impl JobState {
    /// Create a freshly queued job.
    pub fn new(job_id: Uuid, repo_url: impl Into<String>, retry_limit: u32) -> Self {
        Self {
            job_id,
            repo_url: repo_url.into(),
            branch_name: String::new(),
            failures_detected: 0,
            fixes_applied: 0,
            iterations_used: 0,
            retry_limit,
            total_time_seconds: 0.0,
            status: JobStatus::Queued,
            score: 0.0,
            fixes: Vec::new(),
            timeline: Vec::new(),
            raw_logs: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to a new status, rejecting transitions the lifecycle forbids.
    pub fn transition_to(&mut self, new_status: JobStatus) -> DomainResult<()> {
        if self.status == new_status {
            return Ok(());
        }
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: new_status.to_string(),
                reason: "not a valid job lifecycle transition".to_string(),
            });
        }
        self.status = new_status;
        Ok(())
    }

    /// Force the job into `ERROR`, whatever state it was in before.
    ///
    /// A job that already reached a terminal state is left untouched.
    pub fn fail(&mut self, diagnostic: &str) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Error;
        }
        self.append_log(diagnostic);
    }

    pub fn append_log(&mut self, text: &str) {
        self.raw_logs.push_str(text);
    }

    pub fn record_timeline(&mut self, iteration: u32, status: JobStatus) {
        self.timeline.push(TimelineEvent {
            iteration,
            status,
            timestamp: Utc::now(),
        });
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A fix record rendered for the results artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFix {
    #[serde(flatten)]
    pub record: FixRecord,
    /// `"{TYPE} error in {file} line {n} → {Fixed|Annotated}: {description}"`
    pub formatted: String,
}

/// Contents of `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub job_id: Uuid,
    pub repo_url: String,
    pub branch_name: String,
    pub failures_detected: u32,
    pub fixes_applied: u32,
    pub iterations_used: u32,
    pub total_time_seconds: f64,
    pub status: JobStatus,
    pub score: f64,
    pub fixes: Vec<RenderedFix>,
    pub timeline: Vec<TimelineEvent>,
}

impl From<&JobState> for RunResults {
    fn from(job: &JobState) -> Self {
        Self {
            job_id: job.job_id,
            repo_url: job.repo_url.clone(),
            branch_name: job.branch_name.clone(),
            failures_detected: job.failures_detected,
            fixes_applied: job.fixes_applied,
            iterations_used: job.iterations_used,
            total_time_seconds: job.total_time_seconds,
            status: job.status,
            score: job.score,
            fixes: job
                .fixes
                .iter()
                .map(|record| RenderedFix {
                    formatted: record.summary_line().to_string(),
                    record: record.clone(),
                })
                .collect(),
            timeline: job.timeline.clone(),
        }
    }
}
