/// Embedding service trait and the OpenAI-compatible HTTP implementation
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding client initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding service rate limit exceeded")]
    RateLimited,

    #[error("Embedding service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Embedding request failed: {0}")]
    Transport(String),

    #[error("Invalid embedding response: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Only rate limits are worth waiting out; everything else drops the item
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, EmbeddingError::RateLimited)
    }
}

/// Trait for embedding services
///
/// Allows swapping the hosted service for an in-memory one in tests.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate the embedding for a single text (one service call)
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible `/embeddings` endpoints
pub struct OpenAiEmbeddingService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiEmbeddingService {
    /// Create a new service client
    ///
    /// # Arguments
    /// * `api_key` - Bearer token
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `model` - Embedding model name
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::InitializationError(
                "API key is empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| EmbeddingError::InitializationError(format!("Invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        tracing::info!("Using embedding model {} at {}", model, base_url);

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
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

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Decode(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| EmbeddingError::Decode("No embeddings returned".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
