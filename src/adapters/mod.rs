//! Adapters - concrete implementations of the domain ports

pub mod completion;
pub mod git;
pub mod sandbox;
pub mod stack;
pub mod store;

pub use completion::GeminiClient;
pub use git::GitCli;
pub use sandbox::{DockerSandbox, LocalSandbox};
pub use stack::FsStackAnalyzer;
pub use store::InMemoryJobStore;
