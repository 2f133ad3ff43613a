//! LLM access with exponential backoff retry logic.
//!
//! - [`AskAsync`]: core trait, send a [`Prompt`] and get the reply text
//! - [`GroqChat`]: OpenAI-compatible chat completions client (Groq by default)
//! - [`RetryAsk`]: decorator adding retry logic to any `AskAsync`
//! - [`Backoff`]: the retry policy itself, shared with the Notion client
//!
//! # Retry Strategy
//!
//! - Only retryable errors are retried (network, HTTP 429, HTTP 5xx)
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::ProcessorConfig;
use crate::error::ApiError;
use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// One chat completion call: system instruction, user message, sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Short name for logs, e.g. `"summary"`.
    pub task: &'static str,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// Send the prompt and return the model's reply text.
    async fn ask(&self, prompt: &Prompt) -> Result<String, ApiError>;
}

/// Exponential backoff policy.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_retries: usize,
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(5, StdDuration::from_secs(1))
    }
}

impl Backoff {
    pub fn new(max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            what,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.delay_for(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        what,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`].
pub struct RetryAsk<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.backoff.max_retries)
            .field("base_delay", &self.backoff.base_delay)
            .field("max_delay", &self.backoff.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "debug", skip_all, fields(task = prompt.task))]
    async fn ask(&self, prompt: &Prompt) -> Result<String, ApiError> {
        self.backoff
            .retry(prompt.task, || self.inner.ask(prompt))
            .await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client. Groq is the default
/// endpoint; any compatible `api_base` works.
#[derive(Clone)]
pub struct GroqChat {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl fmt::Debug for GroqChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqChat")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GroqChat {
    /// # Errors
    ///
    /// [`ApiError::Config`] when no API key is configured.
    pub fn from_config(config: &ProcessorConfig) -> Result<Self, ApiError> {
        if config.groq_api_key.is_empty() {
            return Err(ApiError::Config("GROQ_API_KEY is not set".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(60))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.groq_api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        }
    }
}

/// Pull the first choice's text out of a completion body.
fn first_choice_content(body: ChatResponse) -> Result<String, ApiError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(ApiError::EmptyResponse("chat completion"))
}

impl AskAsync for GroqChat {
    #[instrument(level = "debug", skip_all, fields(task = prompt.task, model = %self.model))]
    async fn ask(&self, prompt: &Prompt) -> Result<String, ApiError> {
        let t0 = Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, elapsed_ms = t0.elapsed().as_millis(), "chat completion failed");
            return Err(ApiError::from_status(status, body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        debug!(elapsed_ms = t0.elapsed().as_millis(), "chat completion ok");
        first_choice_content(body)
    }
}

/// Build the retrying Groq client the processor uses.
pub fn groq_with_backoff(config: &ProcessorConfig) -> Result<RetryAsk<GroqChat>, ApiError> {
    let client = GroqChat::from_config(config)?;
    Ok(RetryAsk::new(
        client,
        Backoff::new(config.max_retries, StdDuration::from_secs(1)),
    ))
}
