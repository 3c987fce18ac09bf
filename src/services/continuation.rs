//! Continuation oracle: decide whether another iteration is worth running.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::ports::CompletionService;
use crate::services::reply::strip_markdown_fences;

/// Optional contextual judgment consulted after the hard rules.
#[async_trait]
pub trait ContinuationJudge: Send + Sync {
    fn is_available(&self) -> bool;

    /// `None` means no opinion.
    async fn judge(&self, failures: u32, iteration: u32, retry_limit: u32) -> Option<bool>;
}

pub struct ContinuationOracle {
    judge: Option<Arc<dyn ContinuationJudge>>,
}

impl ContinuationOracle {
    /// Hard rules plus the deterministic default.
    pub fn rules_only() -> Self {
        Self { judge: None }
    }

    pub fn with_judge(judge: Arc<dyn ContinuationJudge>) -> Self {
        Self { judge: Some(judge) }
    }

    /// `false` whenever the budget is spent or nothing is failing; otherwise
    /// the judge decides if it has an opinion, else `true`.
    #[instrument(skip(self))]
    pub async fn should_continue(&self, failures: u32, iteration: u32, retry_limit: u32) -> bool {
        if iteration >= retry_limit || failures == 0 {
            return false;
        }

        if let Some(judge) = self.judge.as_ref().filter(|j| j.is_available()) {
            if let Some(decision) = judge.judge(failures, iteration, retry_limit).await {
                debug!(decision, "Judge decided");
                return decision;
            }
        }

        true
    }
}

impl Default for ContinuationOracle {
    fn default() -> Self {
        Self::rules_only()
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    should_continue: bool,
    reason: String,
}

/// Asks a completion backend whether the loop is still converging.
pub struct CompletionJudge {
    service: Arc<dyn CompletionService>,
}

impl CompletionJudge {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    fn build_prompt(failures: u32, iteration: u32, retry_limit: u32) -> String {
        format!(
            "An automated repair loop is fixing a failing test suite.\n\
Iteration: {iteration} of {retry_limit}\n\
Failures found in this iteration: {failures}\n\
\n\
Should the loop run another iteration? Answer with JSON only:\n\
{{\"should_continue\": true, \"reason\": \"short explanation\"}}\n"
        )
    }

    fn parse_reply(reply: &str) -> Option<bool> {
        match serde_json::from_str::<Verdict>(strip_markdown_fences(reply)) {
            Ok(verdict) => {
                debug!(reason = %verdict.reason, "Continuation verdict");
                Some(verdict.should_continue)
            }
            Err(err) => {
                warn!(error = %err, "Ignoring malformed continuation verdict");
                None
            }
        }
    }
}

#[async_trait]
impl ContinuationJudge for CompletionJudge {
    fn is_available(&self) -> bool {
        self.service.is_configured()
    }

    async fn judge(&self, failures: u32, iteration: u32, retry_limit: u32) -> Option<bool> {
        let reply = self
            .service
            .complete(&Self::build_prompt(failures, iteration, retry_limit))
            .await?;
        Self::parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(Option<bool>);

    #[async_trait]
    impl ContinuationJudge for Always {
        fn is_available(&self) -> bool {
            true
        }

        async fn judge(&self, _: u32, _: u32, _: u32) -> Option<bool> {
            self.0
        }
    }

    #[tokio::test]
    async fn test_hard_rules_override_judge() {
        let oracle = ContinuationOracle::with_judge(Arc::new(Always(Some(true))));
        assert!(!oracle.should_continue(3, 5, 5).await);
        assert!(!oracle.should_continue(3, 6, 5).await);
        assert!(!oracle.should_continue(0, 1, 5).await);
    }

    #[tokio::test]
    async fn test_judge_can_stop_early() {
        let oracle = ContinuationOracle::with_judge(Arc::new(Always(Some(false))));
        assert!(!oracle.should_continue(3, 1, 5).await);
    }

    #[tokio::test]
    async fn test_default_continues_with_budget_and_failures() {
        assert!(ContinuationOracle::rules_only().should_continue(2, 1, 5).await);
        let silent = ContinuationOracle::with_judge(Arc::new(Always(None)));
        assert!(silent.should_continue(2, 1, 5).await);
    }

    #[test]
    fn test_verdict_parsing() {
        assert_eq!(
            CompletionJudge::parse_reply("```json\n{\"should_continue\": false, \"reason\": \"stuck\"}\n```"),
            Some(false)
        );
        assert_eq!(CompletionJudge::parse_reply("{\"should_continue\": \"yes\", \"reason\": \"x\"}"), None);
        assert_eq!(CompletionJudge::parse_reply("{\"should_continue\": true}"), None);
        assert_eq!(CompletionJudge::parse_reply("keep going"), None);
    }
}
