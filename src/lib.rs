//! fixloop - autonomous test repair loop
//!
//! fixloop clones a repository, runs its tests in a sandbox, classifies the
//! failures, edits the offending files and commits each change to a
//! dedicated branch, iterating until the tests pass or the budget runs out.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): classifier, fix engine, continuation oracle, scorer
//! - **Application Layer** (`application`): the iteration controller and wiring
//! - **Adapters** (`adapters`): git, sandboxes, stack detection, completion HTTP client, job store
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use fixloop::{build_job_service, ConfigLoader, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let service = build_job_service(&config)?;
//!     let job_id = service
//!         .submit(RunRequest::new("https://github.com/acme/calc.git", "Team 1", "Jane Doe"))
//!         .await?;
//!     println!("queued {job_id}");
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{build_job_service, RepairController, RepairSettings};
pub use domain::models::{
    BugType, Config, ErrorRecord, FixRecord, FixStatus, JobState, JobStatus, RunRequest,
    RunResults,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{format_branch_name, score, JobService};
