//! Detected technology stack of a working copy.

use serde::{Deserialize, Serialize};

/// Command used when no test framework can be detected.
pub const NO_FRAMEWORK_COMMAND: &str = "echo No test framework detected && exit 1";

/// Result of analysing a checked-out repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInfo {
    /// e.g. `python`, `javascript`, `java_gradle`, `java_maven`, `unknown`
    pub language: String,

    /// Shell command that runs the test suite from the repository root
    pub test_command: String,

    /// Container image able to run `test_command`
    pub container_image: String,

    /// Directory holding the build marker, relative to the repository root
    pub project_root: String,
}

impl Default for StackInfo {
    fn default() -> Self {
        Self {
            language: "unknown".to_string(),
            test_command: NO_FRAMEWORK_COMMAND.to_string(),
            container_image: "node:18-slim".to_string(),
            project_root: ".".to_string(),
        }
    }
}
