use async_trait::async_trait;
use condense_common::{AppConfig, CondenseError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm_trait::LlmClient;
use crate::types::{GenerateContentRequest, GenerateContentResponse, GenerateRequest};

/// Gemini `generateContent` API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    client: Client,
}

impl GeminiClient {
    /// Create new Gemini client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let model = model.into();
        info!("Gemini client initialized: {} (model: {})", base_url, model);
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            model,
            max_retries: 1,
            client,
        })
    }

    /// Build a client from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            &config.llm_base_url,
            &config.api_key,
            &config.llm_model,
            config.llm_timeout,
        )?
        .with_max_retries(config.llm_max_retries))
    }

    /// Total attempts per call; values below 1 are treated as 1
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Generate text with retry, racing every attempt and backoff against `cancel`
    async fn generate_with_retry(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = self.endpoint(model);

        debug!(
            "Sending generateContent request - Model: {}, Prompt length: {}",
            model,
            request.prompt.len()
        );

        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CondenseError::cancelled("LLM request cancelled"));
                }
                outcome = self.try_generate(&url, request) => outcome,
            };

            match outcome {
                Ok(text) => {
                    debug!(
                        "Received response - Model: {}, Length: {}, Time: {:?}",
                        model,
                        text.len(),
                        started.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = Duration::from_secs(2u64.pow(attempt - 1));
                    warn!(
                        "LLM request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt, self.max_retries, e, delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(CondenseError::cancelled("LLM request cancelled during backoff"));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single attempt
    async fn try_generate(&self, url: &str, request: &GenerateRequest) -> Result<String> {
        let body = GenerateContentRequest::from_prompt(&request.prompt, request.temperature);

        let mut builder = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CondenseError::network(format!("Failed to send request: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CondenseError::llm(format!(
                "API returned {}: {}",
                status,
                body.trim()
            )));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CondenseError::llm(format!("Failed to parse response: {}", e.without_url())))?;

        if let Some(usage) = &result.usage_metadata {
            debug!(
                "Token usage - Model version: {}, Prompt: {}, Candidates: {}, Total: {}",
                result.model_version.as_deref().unwrap_or("unknown"),
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count
            );
        }

        extract_text(&result)
    }
}

/// Pull the reply text out of a decoded response; blank text is an error
fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    match response.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        Some(_) => Err(CondenseError::llm("Empty text in API response")),
        None => match response.finish_reason() {
            Some(reason) => Err(CondenseError::llm(format!(
                "No content in API response (finish reason: {})",
                reason
            ))),
            None => Err(CondenseError::llm("No content in API response")),
        },
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: GenerateRequest, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(CondenseError::cancelled("LLM request cancelled before sending"));
        }
        self.generate_with_retry(&request, cancel).await
    }
}
