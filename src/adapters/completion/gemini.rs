//! Gemini completion adapter.
//!
//! Makes direct HTTP calls to the `generateContent` endpoint. Every call is
//! throttled by a limiter shared between roles and retried with exponential
//! backoff on rate limiting, server errors and network failures.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::models::{CompletionConfig, CompletionRole};
use crate::domain::ports::CompletionService;

/// Keys starting with this are template placeholders, not credentials.
const PLACEHOLDER_PREFIX: &str = "your_";

#[derive(Debug, Error)]
enum CallError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Envelope(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()?
            .text;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Client-side limiter shared by every role.
pub fn shared_rate_limiter(config: &CompletionConfig) -> Arc<DefaultDirectRateLimiter> {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Gemini `generateContent` client bound to one role's key.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_output_tokens: u32,
    max_retry_elapsed: Duration,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl GeminiClient {
    pub fn new(
        config: &CompletionConfig,
        role: CompletionRole,
        limiter: Arc<DefaultDirectRateLimiter>,
    ) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.key_for(role).map(str::to_string),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retry_elapsed: Duration::from_secs(config.max_retry_elapsed_secs),
            limiter,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn send_once(
        &self,
        key: &str,
        request: &GenerateRequest<'_>,
    ) -> Result<String, backoff::Error<CallError>> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", key)])
            .json(request)
            .send()
            .await
            // The key travels in the query string; keep it out of errors.
            .map_err(|e| backoff::Error::transient(CallError::Transport(e.without_url())))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            debug!(%status, "Transient completion failure");
            return Err(backoff::Error::transient(CallError::Status(status)));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(CallError::Status(status)));
        }

        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(CallError::Transport(e.without_url())))?;

        envelope.first_text().ok_or_else(|| {
            backoff::Error::permanent(CallError::Envelope("no candidate text".to_string()))
        })
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty() && !key.starts_with(PLACEHOLDER_PREFIX))
    }

    async fn complete(&self, prompt: &str) -> Option<String> {
        if !self.is_configured() {
            return None;
        }
        let key = self.api_key.as_deref()?;

        let request = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(self.max_retry_elapsed))
            .build();

        let result = backoff::future::retry(policy, || async {
            self.limiter.until_ready().await;
            self.send_once(key, &request).await
        })
        .await;

        match result {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %err, model = %self.model, "Completion call failed");
                None
            }
        }
    }
}
