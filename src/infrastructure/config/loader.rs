use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Environment variable consulted when no completion key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable consulted when no git token is configured.
pub const GIT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_retry_limit: {0}. Must be at least 1")]
    InvalidMaxRetryLimit(u32),

    #[error("Invalid default_retry_limit: {0}. Must be between 1 and max_retry_limit ({1})")]
    InvalidDefaultRetryLimit(u32, u32),

    #[error("Invalid sandbox timeout: {0}s. Must be positive")]
    InvalidSandboxTimeout(u64),

    #[error("Invalid mount point: {0}. Must be an absolute path")]
    InvalidMountPoint(String),

    #[error("Invalid requests_per_minute: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid temperature: {0}. Must be between 0.0 and 2.0")]
    InvalidTemperature(f32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .fixloop/config.yaml (project config)
    /// 3. .fixloop/local.yaml (local overrides, optional)
    /// 4. Environment variables (FIXLOOP_* prefix, `__` separates sections)
    ///
    /// `GEMINI_API_KEY` and `GITHUB_TOKEN` fill in credentials left unset.
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".fixloop")
    }

    /// Same as [`ConfigLoader::load`] with the project directory made explicit.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("FIXLOOP_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::apply_env_fallbacks(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::apply_env_fallbacks(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    fn apply_env_fallbacks(config: &mut Config) {
        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if config.completion.api_key.is_none() {
            config.completion.api_key = from_env(API_KEY_ENV);
        }
        if config.git.token.is_none() {
            config.git.token = from_env(GIT_TOKEN_ENV);
        }
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let repair = &config.repair;
        if repair.max_retry_limit == 0 {
            return Err(ConfigError::InvalidMaxRetryLimit(repair.max_retry_limit));
        }
        if repair.default_retry_limit == 0 || repair.default_retry_limit > repair.max_retry_limit {
            return Err(ConfigError::InvalidDefaultRetryLimit(
                repair.default_retry_limit,
                repair.max_retry_limit,
            ));
        }
        if repair.status_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "repair.status_poll_ms must be positive".to_string(),
            ));
        }

        if config.sandbox.timeout_secs == 0 {
            return Err(ConfigError::InvalidSandboxTimeout(config.sandbox.timeout_secs));
        }
        if !config.sandbox.mount_point.starts_with('/') {
            return Err(ConfigError::InvalidMountPoint(
                config.sandbox.mount_point.clone(),
            ));
        }

        let completion = &config.completion;
        if completion.base_url.trim().is_empty() || completion.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "completion.base_url and completion.model cannot be empty".to_string(),
            ));
        }
        if completion.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(completion.requests_per_minute));
        }
        if !(0.0..=2.0).contains(&completion.temperature) {
            return Err(ConfigError::InvalidTemperature(completion.temperature));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{LogFormat, SandboxKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repair.default_retry_limit, 5);
        assert_eq!(config.sandbox.mount_point, "/app");
        assert_eq!(config.completion.requests_per_minute, 15);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
repair:
  default_retry_limit: 3
  keep_workdir: true
sandbox:
  kind: local
  timeout_secs: 60
completion:
  model: gemini-1.5-pro
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.repair.default_retry_limit, 3);
        assert_eq!(config.repair.max_retry_limit, 20);
        assert!(config.repair.keep_workdir);
        assert_eq!(config.sandbox.kind, SandboxKind::Local);
        assert_eq!(config.sandbox.timeout_secs, 60);
        assert_eq!(config.completion.model, "gemini-1.5-pro");
        assert_eq!(config.logging.format, LogFormat::Json);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_retry_limits() {
        let mut config = Config::default();
        config.repair.max_retry_limit = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetryLimit(0))
        ));

        let mut config = Config::default();
        config.repair.default_retry_limit = 30;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDefaultRetryLimit(30, 20))
        ));
    }

    #[test]
    fn test_validate_sandbox() {
        let mut config = Config::default();
        config.sandbox.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSandboxTimeout(0))
        ));

        let mut config = Config::default();
        config.sandbox.mount_point = "app".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMountPoint(_))
        ));
    }

    #[test]
    fn test_validate_completion() {
        let mut config = Config::default();
        config.completion.requests_per_minute = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(0))
        ));

        let mut config = Config::default();
        config.completion.temperature = 3.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_project_files_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "repair:\n  default_retry_limit: 4\nlogging:\n  level: warn\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        temp_env::with_vars(
            [
                ("FIXLOOP_REPAIR__DEFAULT_RETRY_LIMIT", Some("7")),
                ("FIXLOOP_SANDBOX__KIND", Some("local")),
                (API_KEY_ENV, None),
                (GIT_TOKEN_ENV, None),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.repair.default_retry_limit, 7, "env should win");
                assert_eq!(config.logging.level, "debug", "local.yaml should win");
                assert_eq!(config.sandbox.kind, SandboxKind::Local);
                assert!(config.completion.api_key.is_none());
            },
        );
    }

    #[test]
    fn test_credential_env_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (API_KEY_ENV, Some("AIzaFromEnvironment")),
                (GIT_TOKEN_ENV, Some("ghp_fromenvironment")),
                ("FIXLOOP_COMPLETION__API_KEY", None),
                ("FIXLOOP_GIT__TOKEN", None),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.completion.api_key.as_deref(), Some("AIzaFromEnvironment"));
                assert_eq!(config.git.token.as_deref(), Some("ghp_fromenvironment"));
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sandbox:\n  timeout_secs: 0").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid sandbox timeout"));
    }
}
