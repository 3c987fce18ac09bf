//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters must implement:
//! - CompletionService: optional text completion backend
//! - Sandbox: isolated test execution
//! - VersionControl: clone, branch, commit, push, cleanup
//! - StackAnalyzer: detect how a repository is tested
//! - JobStore: job state snapshots

pub mod completion;
pub mod job_store;
pub mod sandbox;
pub mod stack_analyzer;
pub mod vcs;

pub use completion::CompletionService;
pub use job_store::JobStore;
pub use sandbox::{Sandbox, SandboxRequest, SandboxResult, NO_TESTS_EXIT_CODE};
pub use stack_analyzer::StackAnalyzer;
pub use vcs::{VcsError, VersionControl};
