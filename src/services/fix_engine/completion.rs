//! Completion-backed whole-file rewrites.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{Rewrite, RewriteStrategy};
use crate::domain::models::ErrorRecord;
use crate::domain::ports::CompletionService;
use crate::services::reply::{excerpt, strip_markdown_fences};

const MAX_LOG_CHARS: usize = 3000;

#[derive(Debug, Deserialize)]
struct FixReply {
    fixed_code: String,
    #[serde(default)]
    description: String,
}

/// Requests a corrected file from a completion backend.
pub struct CompletionFixer {
    service: Arc<dyn CompletionService>,
}

impl CompletionFixer {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    fn build_prompt(error: &ErrorRecord, content: &str, logs: &str) -> String {
        format!(
            "You are fixing a single failing test in a repository.\n\
\n\
File: {file}\n\
Line: {line}\n\
Error type: {bug_type}\n\
Error: {message}\n\
\n\
Constraints:\n\
- Fix ONLY the reported defect.\n\
- Do NOT rename functions, classes or variables.\n\
- Do NOT add new imports.\n\
- Change as few lines as possible; never rewrite more than a small part of the file.\n\
- Return the COMPLETE corrected file.\n\
\n\
Respond with JSON only: {{\"fixed_code\": \"<entire file>\", \"description\": \"<short description of the fix>\"}}\n\
\n\
Current file content:\n\
{content}\n\
\n\
Test output:\n\
{logs}\n",
            file = error.file,
            line = error.line,
            bug_type = error.bug_type,
            message = error.message,
            logs = excerpt(logs, MAX_LOG_CHARS),
        )
    }

    fn parse_reply(error: &ErrorRecord, reply: &str) -> Option<Rewrite> {
        let body = strip_markdown_fences(reply);
        let rewrite = match serde_json::from_str::<FixReply>(body) {
            Ok(parsed) => {
                let description = if parsed.description.trim().is_empty() {
                    fallback_description(error)
                } else {
                    parsed.description.trim().to_string()
                };
                Rewrite {
                    content: parsed.fixed_code,
                    description,
                }
            }
            Err(err) => {
                debug!(error = %err, "Fix reply is not JSON, taking it as the file body");
                Rewrite {
                    content: body.to_string(),
                    description: fallback_description(error),
                }
            }
        };

        if rewrite.content.trim().is_empty() {
            return None;
        }
        Some(rewrite)
    }
}

fn fallback_description(error: &ErrorRecord) -> String {
    format!("fixed {} anomaly", error.bug_type)
}

#[async_trait]
impl RewriteStrategy for CompletionFixer {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn is_available(&self) -> bool {
        self.service.is_configured()
    }

    async fn rewrite(&self, error: &ErrorRecord, content: &str, logs: &str) -> Option<Rewrite> {
        let reply = self
            .service
            .complete(&Self::build_prompt(error, content, logs))
            .await?;
        Self::parse_reply(error, &reply)
    }
}
