/// Rate-limited embedding client
use super::{EmbeddingError, EmbeddingService};
use crate::backoff::{BackoffPolicy, Pacer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps an [`EmbeddingService`] with request pacing, rate-limit retries and
/// a dimension check.
///
/// Every service call, retries included, goes through the pacer. Only
/// [`EmbeddingError::RateLimited`] is retried; a vector of the wrong length is
/// a permanent failure for that text.
pub struct EmbeddingClient {
    service: Arc<dyn EmbeddingService>,
    pacer: Pacer,
    retry: BackoffPolicy,
    dimension: usize,
}

impl EmbeddingClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `service` - Embedding service to call
    /// * `request_delay` - Minimum interval between service calls
    /// * `retry` - Policy applied to rate-limit responses
    /// * `dimension` - Expected vector length
    pub fn new(
        service: Arc<dyn EmbeddingService>,
        request_delay: Duration,
        retry: BackoffPolicy,
        dimension: usize,
    ) -> Self {
        Self {
            service,
            pacer: Pacer::new(request_delay),
            retry,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    /// Embed one text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let service = &self.service;
        let pacer = &self.pacer;
        let max_attempts = self.retry.max_attempts;

        let embedding = self
            .retry
            .retry(
                |e: &EmbeddingError| {
                    if e.is_rate_limit() {
                        warn!("Rate limited by embedding service, backing off");
                        true
                    } else {
                        false
                    }
                },
                |attempt| async move {
                    if attempt > 0 {
                        debug!("Embedding attempt {}/{}", attempt + 1, max_attempts);
                    }
                    pacer.run(service.embed(text)).await
                },
            )
            .await?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}
