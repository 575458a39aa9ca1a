use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_MESSAGE: &str =
    "You are an RGPV exam assistant. Answer questions using ONLY the provided context.";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 300;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again in a moment.";

/// Turns a question plus retrieved context into an answer. Failures come back as
/// readable text so callers can still show their sources.
#[async_trait]
pub trait AnswerGenerator {
    async fn generate_answer(&self, query: &str, context: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (0-based): `base * multiplier^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is used up. The last error is returned as-is.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt + 1 >= max_attempts || !is_retryable(&error) {
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an RGPV exam assistant helping students prepare for exams.

CONTEXT FROM STUDY MATERIAL:
{context}

QUESTION: {query}

INSTRUCTIONS:
- Write a clear, exam-style answer in 5 marks format (100-150 words)
- Use ONLY the information provided in the context above
- Structure your answer in a single well-organized paragraph
- Include examples if they are mentioned in the context
- Write naturally as if explaining to a student
- Do NOT say \"information not available\" - if the context has relevant info, use it to answer
- If the context truly has nothing relevant, then say \"This topic is not covered in the provided material\"

ANSWER:"
    )
}

/// OpenAI-compatible chat completions client pointed at Groq by default.
pub struct GroqClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(DEFAULT_BASE_URL)?.join("chat/completions")?,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// `base_url` is the API root, e.g. `https://api.groq.com/openai/v1/`.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, GenerationError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        self.endpoint = base.join("chat/completions")?;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_MESSAGE },
                    { "role": "user", "content": prompt },
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                details,
            });
        }

        let parsed: Value = response.json().await?;
        completion_text(&parsed)
    }
}

fn completion_text(payload: &Value) -> Result<String, GenerationError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| GenerationError::BadResponse("missing choices[0].message.content".to_string()))
}

#[async_trait]
impl AnswerGenerator for GroqClient {
    async fn generate_answer(&self, query: &str, context: &str) -> String {
        let prompt = build_prompt(query, context);

        let outcome = self
            .retry
            .run(|_| self.complete(&prompt), GenerationError::is_rate_limited)
            .await;

        match outcome {
            Ok(answer) => {
                info!(model = %self.model, answer_chars = answer.len(), "generated answer");
                answer
            }
            Err(error) if error.is_rate_limited() => {
                warn!(%error, "giving up after rate limiting");
                RATE_LIMIT_MESSAGE.to_string()
            }
            Err(error) => {
                warn!(%error, "answer generation failed");
                format!("Error generating answer: {error}")
            }
        }
    }
}
