//! Fix history domain model.

use serde::{Deserialize, Serialize};

use super::error_record::BugType;

/// Prefix carried by every commit the agent creates.
pub const COMMIT_PREFIX: &str = "[AI-AGENT] ";

/// What happened to a single error record during a fix pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixStatus {
    /// The file was rewritten by the completion service
    AiFixed,
    /// An annotation block was appended to the file
    Annotated,
    /// Nothing was written (missing file or rejected rewrite)
    Skipped,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiFixed => "AI_FIXED",
            Self::Annotated => "ANNOTATED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Status for a fix attempt given whether the file was written and by which path.
    pub fn from_attempt(written: bool, ai_fixed: bool) -> Self {
        match (written, ai_fixed) {
            (true, true) => Self::AiFixed,
            (true, false) => Self::Annotated,
            (false, _) => Self::Skipped,
        }
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry in a job's fix history. Appended, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    pub file: String,
    pub bug_type: BugType,
    pub line: u32,
    pub commit_message: String,
    pub status: FixStatus,
}

impl FixRecord {
    /// Build a record from an unprefixed commit message.
    pub fn new(
        file: impl Into<String>,
        bug_type: BugType,
        line: u32,
        message: &str,
        status: FixStatus,
    ) -> Self {
        Self {
            file: file.into(),
            bug_type,
            line,
            commit_message: format!("{COMMIT_PREFIX}{message}"),
            status,
        }
    }

    /// One-line rendering: `"{TYPE} error in {file} line {n} → Fixed: …"`.
    pub fn summary_line(&self) -> &str {
        self.commit_message
            .strip_prefix(COMMIT_PREFIX)
            .unwrap_or(&self.commit_message)
    }
}
