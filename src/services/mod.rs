pub mod branch_naming;
pub mod classifier;
pub mod continuation;
pub mod fix_engine;
pub mod job_service;
pub mod reply;
pub mod scoring;

pub use branch_naming::format_branch_name;
pub use classifier::{
    dedup_records, ClassificationStrategy, CompletionClassifier, ErrorClassifier, RuleClassifier,
};
pub use continuation::{CompletionJudge, ContinuationJudge, ContinuationOracle};
pub use fix_engine::{
    check_diff_limit, strip_annotations, AnnotationFixer, CompletionFixer, FixEngine, FixOutcome,
    Rewrite, RewriteStrategy,
};
pub use job_service::JobService;
pub use scoring::score;
