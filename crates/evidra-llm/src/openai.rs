//! OpenAI-compatible provider implementation
//!
//! Talks to any endpoint implementing the OpenAI embeddings and chat
//! completions APIs. Callers run agents on blocking threads, so this
//! provider uses the blocking HTTP client.
//!
//! # Features
//!
//! - Configurable endpoint, models, and embedding dimension
//! - Retry logic with exponential backoff
//! - Request throttling and a circuit breaker across calls
//! - Timeout handling

use crate::parser::{parse_draft_response, parse_verdict_response};
use crate::prompt::{contradiction_prompt, extraction_prompt};
use crate::LlmError;
use evidra_domain::traits::{ClaimDraft, ContradictionVerdict, ExtractionInput, LanguageModel};
use evidra_sources::{CircuitBreaker, Throttle};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

/// Default chat model for extraction and contradiction checks
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Dimension of the default embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Default timeout for model requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default request rate against the provider
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;

/// OpenAI-compatible API provider
pub struct OpenAiModel {
    endpoint: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    embedding_dimension: usize,
    client: reqwest::blocking::Client,
    max_retries: u32,
    throttle: Throttle,
    breaker: Mutex<CircuitBreaker>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenAiModel {
    /// Create a new provider against the default endpoint and models
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    /// Create a new provider against a specific endpoint
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Communication(format!("Client build failed: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            throttle: Throttle::per_second(DEFAULT_REQUESTS_PER_SECOND),
            breaker: Mutex::new(CircuitBreaker::default()),
        })
    }

    /// Set the chat model
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the embedding model and its dimension
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embedding_model = model.into();
        self.embedding_dimension = dimension;
        self
    }

    /// Set the maximum number of retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the circuit breaker threshold and reset timeout
    pub fn with_breaker(mut self, failure_threshold: u32, reset_timeout: Duration) -> Self {
        self.breaker = Mutex::new(CircuitBreaker::new(failure_threshold, reset_timeout));
        self
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// POST a JSON body with retry and exponential backoff
    ///
    /// Refused outright while the circuit is open; the retry loop
    /// counts as one call against the breaker.
    fn post_with_retry<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        if !self.lock_breaker().allow() {
            return Err(LlmError::CircuitOpen);
        }
        let result = self.post_with_backoff(path, body);
        let mut breaker = self.lock_breaker();
        match &result {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(),
        }
        result
    }

    fn post_with_backoff<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            self.throttle.wait();
            match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<R>().map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        });
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.chat_model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                debug!("Retrying {} after {:?} (attempt {})", path, delay, attempts);
                std::thread::sleep(delay);
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
        };

        let response: ChatResponse = self.post_with_retry("/v1/chat/completions", &request)?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Empty choices array".to_string()))
    }
}

impl LanguageModel for OpenAiModel {
    type Error = LlmError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse(
                "Empty text cannot be embedded".to_string(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response: EmbeddingResponse = self.post_with_retry("/v1/embeddings", &request)?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::InvalidResponse("Empty embedding data".to_string()))?;

        if embedding.len() != self.embedding_dimension {
            return Err(LlmError::InvalidResponse(format!(
                "Expected {}-dimensional embedding, got {}",
                self.embedding_dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn extract_claims(&self, input: &ExtractionInput) -> Result<Vec<ClaimDraft>, Self::Error> {
        let prompt = extraction_prompt(input);
        debug!("Extraction prompt length: {} chars", prompt.len());
        let response = self.chat(&prompt)?;
        parse_draft_response(&response)
    }

    fn assess_contradiction(
        &self,
        a: &str,
        b: &str,
    ) -> Result<ContradictionVerdict, Self::Error> {
        let response = self.chat(&contradiction_prompt(a, b))?;
        parse_verdict_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_creation() {
        let model = OpenAiModel::new("sk-test").unwrap();
        assert_eq!(model.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(model.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(model.embedding_dimension(), DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(model.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_endpoint_trailing_slash_stripped() {
        let model = OpenAiModel::with_endpoint("http://localhost:8080/", "key").unwrap();
        assert_eq!(model.endpoint, "http://localhost:8080");
    }

    #[test]
    fn test_builder_overrides() {
        let model = OpenAiModel::new("key")
            .unwrap()
            .with_chat_model("gpt-4o-mini")
            .with_embedding_model("text-embedding-3-large", 3072)
            .with_max_retries(5);
        assert_eq!(model.chat_model, "gpt-4o-mini");
        assert_eq!(model.embedding_dimension(), 3072);
        assert_eq!(model.max_retries, 5);
    }

    #[test]
    fn test_breaker_opens_after_repeated_failures() {
        // Port 1 refuses connections, so every call fails fast
        let model = OpenAiModel::with_endpoint("http://localhost:1", "key")
            .unwrap()
            .with_max_retries(1)
            .with_breaker(2, Duration::from_secs(300));

        assert!(matches!(
            model.embed("some text"),
            Err(LlmError::Communication(_))
        ));
        assert!(matches!(
            model.embed("some text"),
            Err(LlmError::Communication(_))
        ));
        // Two failures tripped the breaker; no request is attempted
        assert!(matches!(model.embed("some text"), Err(LlmError::CircuitOpen)));
    }

    #[test]
    fn test_empty_text_rejected_before_network() {
        let model = OpenAiModel::with_endpoint("http://localhost:1", "key")
            .unwrap()
            .with_max_retries(1);
        let result = model.embed("   ");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
