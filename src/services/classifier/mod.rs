//! Error classification service.
//!
//! Turns raw test output into structured [`ErrorRecord`]s. An optional
//! enhanced strategy (usually completion-backed) is tried first; the
//! rule-based baseline runs whenever the enhanced path is unavailable or
//! gives up.

mod completion;
mod rules;

pub use completion::CompletionClassifier;
pub use rules::{classify_exception, RuleClassifier};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::models::ErrorRecord;

/// A way of extracting error records from test output.
#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &'static str;

    /// Cheap probe: is this strategy worth trying right now?
    fn is_available(&self) -> bool;

    /// `None` means "could not decide"; the caller falls back.
    async fn classify(&self, logs: &str) -> Option<Vec<ErrorRecord>>;
}

/// Keep the first record for each `(file, line, type)`.
pub fn dedup_records(records: Vec<ErrorRecord>) -> Vec<ErrorRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let (file, line, bug_type) = record.identity();
            seen.insert((file.to_string(), line, bug_type))
        })
        .collect()
}

/// Classifier used by the repair loop.
pub struct ErrorClassifier {
    enhanced: Option<Arc<dyn ClassificationStrategy>>,
    baseline: RuleClassifier,
}

impl ErrorClassifier {
    /// Rule-based classifier only.
    pub fn rules_only() -> Self {
        Self {
            enhanced: None,
            baseline: RuleClassifier::new(),
        }
    }

    /// Prefer `enhanced`, falling back to the rules.
    pub fn with_enhanced(enhanced: Arc<dyn ClassificationStrategy>) -> Self {
        Self {
            enhanced: Some(enhanced),
            baseline: RuleClassifier::new(),
        }
    }

    #[instrument(skip(self, logs), fields(log_bytes = logs.len()))]
    pub async fn classify(&self, logs: &str) -> Vec<ErrorRecord> {
        if logs.trim().is_empty() {
            return Vec::new();
        }

        if let Some(enhanced) = self.enhanced.as_ref().filter(|s| s.is_available()) {
            match enhanced.classify(logs).await {
                Some(records) => {
                    debug!(strategy = enhanced.name(), count = records.len(), "Classified logs");
                    return dedup_records(records);
                }
                None => {
                    debug!(strategy = enhanced.name(), "Enhanced classification gave up, using rules");
                }
            }
        }

        self.baseline.classify(logs)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::rules_only()
    }
}
