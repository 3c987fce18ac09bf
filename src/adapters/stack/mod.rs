//! Filesystem-based stack detection.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::StackInfo;
use crate::domain::ports::StackAnalyzer;

/// Directories that never hold project markers worth trusting.
const SKIPPED_DIRS: [&str; 5] = [".git", "node_modules", "__pycache__", ".venv", "venv"];

const GRADLE_COMMAND: &str = "chmod +x gradlew && ./gradlew test";
const MAVEN_COMMAND: &str = "mvn test -q";
const PYTHON_COMMAND: &str = "if [ -f requirements.txt ]; then pip install -q -r requirements.txt; fi; pip install -q pytest && pytest -v --tb=long";
const NPM_COMMAND: &str = "npm ci --silent && npm test";
const NODE_CHECK_COMMAND: &str =
    r#"find . -name "*.js" -o -name "*.jsx" | xargs -I{} node --check {} 2>&1"#;

/// Build markers, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Marker {
    Gradle,
    Maven,
    Python,
    PackageJson,
    JavaSource,
    ScriptSource,
}

impl Marker {
    fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "build.gradle" | "build.gradle.kts" => Some(Self::Gradle),
            "pom.xml" => Some(Self::Maven),
            "requirements.txt" | "setup.py" | "pyproject.toml" => Some(Self::Python),
            "package.json" => Some(Self::PackageJson),
            _ if lower.ends_with(".java") => Some(Self::JavaSource),
            _ if [".js", ".jsx", ".ts", ".tsx"].iter().any(|ext| lower.ends_with(ext)) => {
                Some(Self::ScriptSource)
            }
            _ => None,
        }
    }

    fn stack(self, project_root: String) -> StackInfo {
        let (language, image, command) = match self {
            Self::Gradle | Self::JavaSource => ("java_gradle", "gradle:7.6-jdk17", GRADLE_COMMAND),
            Self::Maven => ("java_maven", "maven:3.9-eclipse-temurin-17", MAVEN_COMMAND),
            Self::Python => ("python", "python:3.9-slim", PYTHON_COMMAND),
            Self::PackageJson => ("javascript", "node:18-slim", NPM_COMMAND),
            Self::ScriptSource => ("javascript", "node:18-slim", NODE_CHECK_COMMAND),
        };
        StackInfo {
            language: language.to_string(),
            test_command: command.to_string(),
            container_image: image.to_string(),
            project_root,
        }
    }
}

/// Detects the stack from build files and source extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStackAnalyzer;

impl FsStackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous scan; strongest marker wins, first seen on ties.
    pub fn scan(root: &Path) -> StackInfo {
        let mut best: Option<(Marker, String)> = None;

        let entries = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file());

        for entry in entries {
            let Some(marker) = Marker::from_file_name(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            if best.as_ref().is_some_and(|(current, _)| *current <= marker) {
                continue;
            }
            best = Some((marker, project_root(root, &entry)));
        }

        best.map(|(marker, project_root)| marker.stack(project_root))
            .unwrap_or_default()
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS.iter().any(|dir| entry.file_name() == *dir)
}

fn project_root(root: &Path, entry: &DirEntry) -> String {
    entry
        .path()
        .parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map_or_else(|| ".".to_string(), |rel| rel.to_string_lossy().replace('\\', "/"))
}

#[async_trait]
impl StackAnalyzer for FsStackAnalyzer {
    #[instrument(skip(self))]
    async fn analyze(&self, path: &Path) -> DomainResult<StackInfo> {
        let root = path.to_path_buf();
        let stack = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("stack scan panicked: {e}")))?;
        debug!(language = %stack.language, root = %stack.project_root, "Detected stack");
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NO_FRAMEWORK_COMMAND;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_empty_repository_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.language, "unknown");
        assert_eq!(stack.test_command, NO_FRAMEWORK_COMMAND);
    }

    #[test]
    fn test_python_project() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "requirements.txt");
        touch(dir.path(), "tests/test_calc.py");
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.language, "python");
        assert_eq!(stack.container_image, "python:3.9-slim");
        assert!(stack.test_command.contains("pytest"));
        assert_eq!(stack.project_root, ".");
    }

    #[test]
    fn test_gradle_beats_everything() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "package.json");
        touch(dir.path(), "setup.py");
        touch(dir.path(), "service/build.gradle.kts");
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.language, "java_gradle");
        assert_eq!(stack.project_root, "service");
    }

    #[test]
    fn test_package_json_beats_loose_scripts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.js");
        touch(dir.path(), "web/package.json");
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.test_command, NPM_COMMAND);
        assert_eq!(stack.project_root, "web");
    }

    #[test]
    fn test_loose_scripts_get_syntax_check() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/index.js");
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.language, "javascript");
        assert!(stack.test_command.contains("node --check"));
    }

    #[test]
    fn test_vendored_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "node_modules/lib/package.json");
        touch(dir.path(), ".venv/lib/setup.py");
        let stack = FsStackAnalyzer::scan(dir.path());
        assert_eq!(stack.language, "unknown");
    }

    #[tokio::test]
    async fn test_analyze_runs_scan() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pom.xml");
        let stack = FsStackAnalyzer::new().analyze(dir.path()).await.unwrap();
        assert_eq!(stack.language, "java_maven");
    }
}
