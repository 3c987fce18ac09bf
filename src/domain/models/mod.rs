pub mod config;
pub mod error_record;
pub mod fix;
pub mod job;
pub mod stack;

pub use config::{
    CompletionConfig, CompletionRole, Config, GitConfig, LogFormat, LoggingConfig, RepairConfig,
    RotationPolicy, SandboxConfig, SandboxKind,
};
pub use error_record::{BugType, ErrorRecord};
pub use fix::{FixRecord, FixStatus, COMMIT_PREFIX};
pub use job::{JobState, JobStatus, RenderedFix, RunRequest, RunResults, TimelineEvent};
pub use stack::{StackInfo, NO_FRAMEWORK_COMMAND};
