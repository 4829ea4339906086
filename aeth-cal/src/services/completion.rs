//! Completion client: prompt in, raw text out
//!
//! The client never interprets the text it returns. Parsing and validation
//! belong to the caller (architect, probe generator, evaluator).

use aeth_common::config::CompletionConfig;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 5;
const ERROR_BODY_CHARS: usize = 300;

/// Completion transport failure
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Network(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion service returned {0}: {1}")]
    Api(u16, String),

    #[error("Unreadable completion response: {0}")]
    Parse(String),
}

/// Black-box text completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Run one completion bounded by `limit`; elapsed time becomes [`CompletionError::Timeout`]
pub async fn complete_within(
    client: &dyn CompletionClient,
    prompt: &str,
    limit: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(limit, client.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout(limit)),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, or empty when any link is absent
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` client
///
/// Requests are paced by a token bucket (`requests_per_second`) shared by
/// every caller of this instance.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl GeminiClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CompletionError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.rate_limiter.until_ready().await;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        tracing::debug!(prompt_chars = prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(Duration::ZERO)
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api(
                status.as_u16(),
                text.chars().take(ERROR_BODY_CHARS).collect(),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let text = parsed.into_text();
        tracing::debug!(response_chars = text.len(), "Completion received");
        Ok(text)
    }
}
