//! Fix engine.
//!
//! Produces a new version of one file for one error record: either a full
//! rewrite from the enhanced strategy, accepted only if it passes the size
//! gate, or the original text with an annotation block appended.

mod annotation;
mod completion;

pub use annotation::{
    instruction, short_description, strip_annotations, AnnotationFixer, ANNOTATION_HEADER,
};
pub use completion::CompletionFixer;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::models::ErrorRecord;

/// Files shorter than this get the lenient allowance.
pub const SMALL_FILE_CHARS: usize = 1000;
/// Max size change ratio for small files.
pub const SMALL_FILE_RATIO: f64 = 0.90;
/// Max size change ratio for everything else.
pub const LARGE_FILE_RATIO: f64 = 0.30;

/// Size-based safety gate for whole-file rewrites.
///
/// `ratio = |len(modified) - len(original)| / len(original)`, compared
/// against a threshold that depends on the original's size. An empty
/// original is always accepted.
pub fn check_diff_limit(original: &str, modified: &str) -> bool {
    if original.is_empty() {
        return true;
    }

    let original_len = original.len() as f64;
    let ratio = (modified.len() as f64 - original_len).abs() / original_len;
    let limit = if original.len() < SMALL_FILE_CHARS {
        SMALL_FILE_RATIO
    } else {
        LARGE_FILE_RATIO
    };
    ratio <= limit
}

/// A full replacement for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub description: String,
}

/// A way of producing a corrected file.
#[async_trait]
pub trait RewriteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// `None` means no usable rewrite.
    async fn rewrite(&self, error: &ErrorRecord, content: &str, logs: &str) -> Option<Rewrite>;
}

/// Result of [`FixEngine::apply_fix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub new_content: String,

    /// Unprefixed commit message
    pub commit_message: String,

    /// Whether `new_content` came from a rewrite rather than an annotation
    pub ai_fixed: bool,

    /// A rewrite was produced but failed the size gate
    pub rejected_rewrite: bool,
}

pub struct FixEngine {
    enhanced: Option<Arc<dyn RewriteStrategy>>,
    annotator: AnnotationFixer,
}

impl FixEngine {
    pub fn annotation_only() -> Self {
        Self {
            enhanced: None,
            annotator: AnnotationFixer::new(),
        }
    }

    pub fn with_enhanced(enhanced: Arc<dyn RewriteStrategy>) -> Self {
        Self {
            enhanced: Some(enhanced),
            annotator: AnnotationFixer::new(),
        }
    }

    #[instrument(skip(self, file_content, test_logs), fields(file = %error.file, line = error.line, bug_type = %error.bug_type))]
    pub async fn apply_fix(&self, error: &ErrorRecord, file_content: &str, test_logs: &str) -> FixOutcome {
        let cleaned = strip_annotations(file_content);
        let mut rejected_rewrite = false;

        if let Some(enhanced) = self.enhanced.as_ref().filter(|s| s.is_available()) {
            match enhanced.rewrite(error, &cleaned, test_logs).await {
                Some(rewrite) if check_diff_limit(&cleaned, &rewrite.content) => {
                    debug!(strategy = enhanced.name(), "Accepted rewrite");
                    return FixOutcome {
                        commit_message: fixed_message(error, &rewrite.description),
                        new_content: rewrite.content,
                        ai_fixed: true,
                        rejected_rewrite: false,
                    };
                }
                Some(rewrite) => {
                    warn!(
                        original_len = cleaned.len(),
                        rewrite_len = rewrite.content.len(),
                        "Rejected oversized rewrite, annotating instead"
                    );
                    rejected_rewrite = true;
                }
                None => debug!(strategy = enhanced.name(), "No usable rewrite, annotating instead"),
            }
        }

        FixOutcome {
            new_content: self.annotator.annotate(error, &cleaned, test_logs),
            commit_message: annotated_message(error),
            ai_fixed: false,
            rejected_rewrite,
        }
    }
}

impl Default for FixEngine {
    fn default() -> Self {
        Self::annotation_only()
    }
}

fn location(error: &ErrorRecord) -> String {
    format!("{} error in {} line {}", error.bug_type, error.file, error.line)
}

/// `"{TYPE} error in {file} line {n} → Fixed: {description}"`
pub fn fixed_message(error: &ErrorRecord, description: &str) -> String {
    format!("{} → Fixed: {description}", location(error))
}

/// `"{TYPE} error in {file} line {n} → Annotated: {short description}"`
pub fn annotated_message(error: &ErrorRecord) -> String {
    format!(
        "{} → Annotated: {}",
        location(error),
        short_description(error.bug_type)
    )
}
