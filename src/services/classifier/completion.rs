//! Completion-backed classification.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::ClassificationStrategy;
use crate::domain::models::{BugType, ErrorRecord};
use crate::domain::ports::CompletionService;
use crate::services::reply::{excerpt, strip_markdown_fences};

/// Only the head of the logs is sent; failures are usually reported early.
const MAX_LOG_CHARS: usize = 4000;

/// Entries are validated one by one so a single bad record does not sink
/// the whole reply.
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    errors: Vec<serde_json::Value>,
}

/// Asks a completion backend to classify logs into the closed taxonomy.
pub struct CompletionClassifier {
    service: Arc<dyn CompletionService>,
}

impl CompletionClassifier {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    fn build_prompt(logs: &str) -> String {
        let allowed = BugType::ALL
            .iter()
            .map(BugType::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "You are a test failure analyst. Read the test output below and list every \
distinct error that caused the run to fail.\n\
\n\
Respond with JSON only, exactly in this shape:\n\
{{\"errors\": [{{\"file\": \"path/to/file.py\", \"line\": 10, \"type\": \"SYNTAX\", \"message\": \"short description\"}}]}}\n\
\n\
Rules:\n\
- \"type\" must be one of: {allowed}\n\
- \"file\" is the path of the source file to change, relative to the repository root\n\
- \"line\" is a positive integer, or 0 if unknown\n\
- return {{\"errors\": []}} if no errors are present\n\
\n\
Test output:\n\
{logs}\n",
            logs = excerpt(logs, MAX_LOG_CHARS),
        )
    }

    /// Valid records of the reply. `None` when the reply is not the expected
    /// envelope, or when it listed errors and none of them were usable.
    fn parse_reply(reply: &str) -> Option<Vec<ErrorRecord>> {
        let parsed = match serde_json::from_str::<ClassifierReply>(strip_markdown_fences(reply)) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "Discarding malformed classifier reply");
                return None;
            }
        };

        let listed = parsed.errors.len();
        let records: Vec<ErrorRecord> = parsed
            .errors
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ErrorRecord>(entry) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!(error = %err, "Dropping malformed classifier record");
                    None
                }
            })
            .collect();

        if records.len() < listed {
            warn!(kept = records.len(), listed, "Classifier reply had malformed records");
        }
        if listed > 0 && records.is_empty() {
            return None;
        }
        Some(records)
    }
}

#[async_trait]
impl ClassificationStrategy for CompletionClassifier {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn is_available(&self) -> bool {
        self.service.is_configured()
    }

    async fn classify(&self, logs: &str) -> Option<Vec<ErrorRecord>> {
        let reply = self.service.complete(&Self::build_prompt(logs)).await?;
        Self::parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Option<&'static str>);

    #[async_trait]
    impl CompletionService for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn complete(&self, _prompt: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn classifier(reply: Option<&'static str>) -> CompletionClassifier {
        CompletionClassifier::new(Arc::new(Canned(reply)))
    }

    #[tokio::test]
    async fn test_parses_fenced_reply_and_coerces_labels() {
        let reply = "```json\n{\"errors\": [\
            {\"file\": \"a.py\", \"line\": 3, \"type\": \"import\", \"message\": \"no module\"},\
            {\"file\": \"b.py\", \"line\": 7, \"type\": \"WEIRD\", \"message\": \"?\"}]}\n```";
        let records = classifier(Some(reply)).classify("logs").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bug_type, BugType::Import);
        assert_eq!(records[1].bug_type, BugType::Logic);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_none() {
        assert!(classifier(Some("I think it is line 3")).classify("logs").await.is_none());
        assert!(classifier(Some("{\"errors\": [{\"file\": \"a.py\", \"line\": -1, \"type\": \"SYNTAX\", \"message\": \"x\"}]}"))
            .classify("logs")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_records_are_dropped_individually() {
        let reply = "{\"errors\": [\
            {\"file\": \"a.py\", \"line\": \"12\", \"type\": \"SYNTAX\", \"message\": \"quoted line\"},\
            {\"file\": \"b.py\", \"line\": 4, \"type\": null, \"message\": \"null type\"},\
            {\"file\": \"c.py\", \"line\": 9, \"type\": \"INDENTATION\", \"message\": \"ok\"}]}";
        let records = classifier(Some(reply)).classify("logs").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file, "c.py");
        assert_eq!(records[0].line, 9);
        assert_eq!(records[0].bug_type, BugType::Indentation);
    }

    #[tokio::test]
    async fn test_empty_error_list_is_kept() {
        let records = classifier(Some("{\"errors\": []}")).classify("logs").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_no_reply_is_none() {
        assert!(classifier(None).classify("logs").await.is_none());
    }

    #[test]
    fn test_prompt_truncates_logs() {
        let logs = "x".repeat(MAX_LOG_CHARS + 500);
        let prompt = CompletionClassifier::build_prompt(&logs);
        assert!(prompt.contains(&"x".repeat(MAX_LOG_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_LOG_CHARS + 1)));
        assert!(prompt.contains("TYPE_ERROR"));
    }
}
