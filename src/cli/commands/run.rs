//! Submit a repair job and follow it to completion.

use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;

use crate::application::build_job_service;
use crate::cli::output::progress::{create_spinner, ProgressBarExt};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, JobState, JobStatus, RunRequest, RunResults};

/// How many trailing log lines to show for a failed job.
const ERROR_LOG_TAIL: usize = 20;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository to clone (https URL)
    pub repo_url: String,
    /// Team name, used in the branch name
    #[arg(short, long)]
    pub team: String,
    /// Team leader name, used in the branch name
    #[arg(short, long)]
    pub leader: String,
    /// Iteration budget (defaults to repair.default_retry_limit)
    #[arg(short, long)]
    pub retry_limit: Option<u32>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub results: RunResults,
    #[serde(skip)]
    retry_limit: u32,
    #[serde(skip)]
    log_tail: Vec<String>,
}

impl From<&JobState> for RunOutput {
    fn from(job: &JobState) -> Self {
        let log_tail = if job.status == JobStatus::Error {
            let lines: Vec<&str> = job.raw_logs.lines().filter(|l| !l.trim().is_empty()).collect();
            lines[lines.len().saturating_sub(ERROR_LOG_TAIL)..]
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            results: RunResults::from(job),
            retry_limit: job.retry_limit,
            log_tail,
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let r = &self.results;
        let mut lines = vec![
            format!("Job:        {}", r.job_id),
            format!("Repository: {}", r.repo_url),
            format!("Branch:     {}", r.branch_name),
            format!("Status:     {}", formatter.format_job_status(r.status)),
            format!("Failures:   {}", r.failures_detected),
            format!("Fixes:      {}", r.fixes_applied),
            format!("Iterations: {}/{}", r.iterations_used, self.retry_limit),
            format!("Time:       {:.2}s", r.total_time_seconds),
            format!("Score:      {}", r.score),
        ];

        if !r.fixes.is_empty() {
            let records: Vec<_> = r.fixes.iter().map(|fix| fix.record.clone()).collect();
            lines.push(String::new());
            lines.push(formatter.format_fixes(&records));
        }

        if !self.log_tail.is_empty() {
            lines.push(String::new());
            lines.push("Last log lines:".to_string());
            lines.extend(self.log_tail.iter().map(|line| format!("  {line}")));
        }

        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = build_job_service(config).context("Failed to assemble repair pipeline")?;

    let mut request = RunRequest::new(args.repo_url, args.team, args.leader);
    request.retry_limit = args.retry_limit;

    let job_id = service.submit(request).await.context("Job was rejected")?;
    let poll = Duration::from_millis(config.repair.status_poll_ms);

    let job = if json_mode {
        service
            .wait_for_terminal(job_id, poll)
            .await
            .context("Lost track of job")?
    } else {
        let spinner = create_spinner(format!("Job {job_id} queued"));
        let job = loop {
            let job = service.status(job_id).await.context("Lost track of job")?;
            if job.is_terminal() {
                break job;
            }
            spinner.set_message(format!(
                "{} (iteration {}/{})",
                job.status, job.iterations_used, job.retry_limit
            ));
            tokio::time::sleep(poll).await;
        };

        match job.status {
            JobStatus::Passed => spinner.finish_success("All tests passed"),
            JobStatus::Error => spinner.finish_error("Job failed"),
            _ => spinner.finish_warning("Retry budget exhausted"),
        }
        job
    };

    output(&RunOutput::from(&job), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_job_shows_log_tail() {
        let mut job = JobState::new(Uuid::new_v4(), "https://example.com/r.git", 5);
        job.append_log("Analyzed stack: python\n");
        job.fail("\nInfra Error: docker daemon not running\n");

        let out = RunOutput::from(&job);
        assert_eq!(out.log_tail.last().map(String::as_str), Some("Infra Error: docker daemon not running"));
        assert!(out.to_human().contains("Last log lines:"));
    }

    #[test]
    fn test_json_output_matches_results_shape() {
        let job = JobState::new(Uuid::new_v4(), "https://example.com/r.git", 5);
        let json = RunOutput::from(&job).to_json();
        assert_eq!(json["status"], "QUEUED");
        assert!(json.get("fixes").is_some());
        assert!(json.get("log_tail").is_none());
    }
}
