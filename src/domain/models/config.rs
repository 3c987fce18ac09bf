use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for fixloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Repair loop configuration
    #[serde(default)]
    pub repair: RepairConfig,

    /// Test sandbox configuration
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Optional completion service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Version control configuration
    #[serde(default)]
    pub git: GitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Copy of this configuration with every secret replaced by a marker.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]".to_string());
        let mut copy = self.clone();
        copy.completion.api_key = mask(&self.completion.api_key);
        copy.completion.classifier_key = mask(&self.completion.classifier_key);
        copy.completion.fixer_key = mask(&self.completion.fixer_key);
        copy.completion.verifier_key = mask(&self.completion.verifier_key);
        copy.git.token = mask(&self.git.token);
        copy
    }
}

/// Repair loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepairConfig {
    /// Iteration budget used when a request does not name one
    #[serde(default = "default_retry_limit")]
    pub default_retry_limit: u32,

    /// Upper bound accepted for a requested retry limit
    #[serde(default = "default_max_retry_limit")]
    pub max_retry_limit: u32,

    /// Parent directory for per-job working copies
    #[serde(default = "default_workdir_root")]
    pub workdir_root: PathBuf,

    /// Keep the working copy after the job ends (debugging aid)
    #[serde(default)]
    pub keep_workdir: bool,

    /// Poll interval used when waiting for a job to finish
    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,
}

const fn default_retry_limit() -> u32 {
    5
}

const fn default_max_retry_limit() -> u32 {
    20
}

fn default_workdir_root() -> PathBuf {
    std::env::temp_dir().join("fixloop")
}

const fn default_status_poll_ms() -> u64 {
    500
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            default_retry_limit: default_retry_limit(),
            max_retry_limit: default_max_retry_limit(),
            workdir_root: default_workdir_root(),
            keep_workdir: false,
            status_poll_ms: default_status_poll_ms(),
        }
    }
}

/// Which sandbox runs the test command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SandboxKind {
    /// `docker run` with the working copy mounted
    #[default]
    Docker,
    /// Plain `sh -c` in the working copy
    Local,
}

/// Test sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    #[serde(default)]
    pub kind: SandboxKind,

    /// Hard limit for one test run
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,

    /// Run locally when the docker binary cannot be started
    #[serde(default = "default_true")]
    pub local_fallback: bool,

    /// Where the working copy is mounted inside the container
    #[serde(default = "default_mount_point")]
    pub mount_point: String,
}

const fn default_sandbox_timeout_secs() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

fn default_mount_point() -> String {
    "/app".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            kind: SandboxKind::default(),
            timeout_secs: default_sandbox_timeout_secs(),
            local_fallback: true,
            mount_point: default_mount_point(),
        }
    }
}

/// Role a completion call is made for; each role may carry its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionRole {
    Classifier,
    Fixer,
    Verifier,
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Shared key, used by every role without its own key
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub classifier_key: Option<String>,

    #[serde(default)]
    pub fixer_key: Option<String>,

    #[serde(default)]
    pub verifier_key: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,

    /// Client-side throttle
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Total time budget for retrying one call
    #[serde(default = "default_max_retry_elapsed_secs")]
    pub max_retry_elapsed_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_completion_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_completion_model() -> String {
    "gemini-2.0-flash".to_string()
}

const fn default_completion_timeout_secs() -> u64 {
    30
}

const fn default_requests_per_minute() -> u32 {
    15
}

const fn default_max_retry_elapsed_secs() -> u64 {
    20
}

const fn default_temperature() -> f32 {
    0.2
}

const fn default_max_output_tokens() -> u32 {
    4096
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            api_key: None,
            classifier_key: None,
            fixer_key: None,
            verifier_key: None,
            timeout_secs: default_completion_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            max_retry_elapsed_secs: default_max_retry_elapsed_secs(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl CompletionConfig {
    /// Key for a role, falling back to the shared key. Blank keys count as absent.
    pub fn key_for(&self, role: CompletionRole) -> Option<&str> {
        let specific = match role {
            CompletionRole::Classifier => self.classifier_key.as_deref(),
            CompletionRole::Fixer => self.fixer_key.as_deref(),
            CompletionRole::Verifier => self.verifier_key.as_deref(),
        };
        specific
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.as_deref().filter(|key| !key.trim().is_empty()))
    }
}

/// Version control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitConfig {
    /// Token injected into https clone URLs
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_author_name() -> String {
    "fixloop-agent".to_string()
}

fn default_author_email() -> String {
    "agent@fixloop.local".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            token: None,
            author_name: default_author_name(),
            author_email: default_author_email(),
            remote: default_remote(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for JSON log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit to stderr
    #[serde(default = "default_true")]
    pub enable_console: bool,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_console: true,
            rotation: RotationPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_falls_back_to_shared_key() {
        let config = CompletionConfig {
            api_key: Some("shared".to_string()),
            fixer_key: Some("fixer".to_string()),
            verifier_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.key_for(CompletionRole::Fixer), Some("fixer"));
        assert_eq!(config.key_for(CompletionRole::Classifier), Some("shared"));
        assert_eq!(config.key_for(CompletionRole::Verifier), Some("shared"));
    }

    #[test]
    fn test_key_for_none_without_keys() {
        let config = CompletionConfig::default();
        assert_eq!(config.key_for(CompletionRole::Classifier), None);
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = Config::default();
        config.completion.api_key = Some("AIzaSecret".to_string());
        config.git.token = Some("ghp_secret".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.completion.api_key.as_deref(), Some("[REDACTED]"));
        assert_eq!(redacted.git.token.as_deref(), Some("[REDACTED]"));
        assert_eq!(redacted.completion.fixer_key, None);
    }
}
