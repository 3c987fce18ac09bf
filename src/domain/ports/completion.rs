//! Completion service port - optional text completion backend.

use async_trait::async_trait;

/// Trait for an external text-completion backend.
///
/// The service is treated as unreliable: every failure (missing key,
/// timeout, HTTP error, malformed envelope) is reported as `None` so that
/// callers can fall back to their deterministic path.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Whether the backend is configured well enough to be worth calling.
    fn is_configured(&self) -> bool;

    /// Send a prompt and return the trimmed reply text.
    async fn complete(&self, prompt: &str) -> Option<String>;
}
