/// Batched upload with partial-failure isolation
use crate::backoff::{BackoffPolicy, Pacer};
use crate::document::IndexDocument;
use crate::search::{BulkResponse, SearchBackend, SearchError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error messages kept per result
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Counts for one batch or one whole load
///
/// `success_count + error_count` always equals the number of documents
/// submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    pub success_count: usize,
    pub error_count: usize,
    pub error_samples: Vec<String>,
    pub batches: usize,
}

impl UploadResult {
    pub fn submitted(&self) -> usize {
        self.success_count + self.error_count
    }

    /// Fraction of submitted documents that were indexed; 1.0 for an empty load
    pub fn success_ratio(&self) -> f64 {
        match self.submitted() {
            0 => 1.0,
            n => self.success_count as f64 / n as f64,
        }
    }

    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.success_ratio() >= threshold
    }

    fn record_error(&mut self, message: String) {
        self.error_count += 1;
        if self.error_samples.len() < MAX_ERROR_SAMPLES {
            self.error_samples.push(message);
        }
    }

    pub fn merge(&mut self, other: UploadResult) {
        self.success_count += other.success_count;
        self.error_count += other.error_count;
        self.batches += other.batches;
        for sample in other.error_samples {
            if self.error_samples.len() >= MAX_ERROR_SAMPLES {
                break;
            }
            self.error_samples.push(sample);
        }
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every item indexed
    Succeeded,
    /// The request went through but some items were rejected
    PartialFailure,
    /// The request itself failed; items were retried one by one
    Failed,
}

/// Bulk loader settings
#[derive(Debug, Clone)]
pub struct BulkSettings {
    pub batch_size: usize,
    /// Pause between the end of one batch and the start of the next
    pub batch_pause: Duration,
    /// Retry policy for transport-level batch failures
    pub retry: BackoffPolicy,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_pause: Duration::from_secs(1),
            retry: BackoffPolicy::exponential(Duration::from_secs(2), Duration::from_secs(600), 5),
        }
    }
}

/// Uploads validated documents to one index at a time
pub struct BulkLoader<'a> {
    backend: &'a dyn SearchBackend,
    settings: BulkSettings,
    pacer: Pacer,
}

impl<'a> BulkLoader<'a> {
    pub fn new(backend: &'a dyn SearchBackend, settings: BulkSettings) -> Self {
        let pacer = Pacer::new(settings.batch_pause);
        Self {
            backend,
            settings,
            pacer,
        }
    }

    /// Upload `docs` to `index` in fixed-size batches, in input order
    pub async fn load(&self, index: &str, docs: &[IndexDocument]) -> UploadResult {
        let total = docs.len();
        let mut result = UploadResult::default();
        if total == 0 {
            info!("Nothing to upload to {}", index);
            return result;
        }

        info!("Uploading {} documents to {}", total, index);
        let batch_size = self.settings.batch_size.max(1);
        let mut done = 0;

        for batch in docs.chunks(batch_size) {
            let (outcome, batch_result) = self.pacer.run(self.upload_batch(index, batch)).await;
            debug!(
                "Batch {} of {} documents: {:?}",
                result.batches + 1,
                batch.len(),
                outcome
            );
            result.merge(batch_result);
            result.batches += 1;
            done += batch.len();

            info!(
                "   progress: {}/{} ({:.1}%) - success: {}",
                done,
                total,
                done as f64 / total as f64 * 100.0,
                result.success_count
            );
        }

        info!(
            "Uploaded {}/{} documents to {} ({} errors)",
            result.success_count, total, index, result.error_count
        );
        result
    }

    async fn upload_batch(
        &self,
        index: &str,
        batch: &[IndexDocument],
    ) -> (BatchOutcome, UploadResult) {
        let backend = self.backend;
        let response = self
            .settings
            .retry
            .retry(SearchError::is_transient, |attempt| async move {
                if attempt > 0 {
                    warn!("Retrying bulk request to {} (attempt {})", index, attempt + 1);
                }
                backend.bulk(index, batch).await
            })
            .await;

        match response {
            Ok(response) => {
                let result = count_items(batch, &response);
                let outcome = if result.error_count == 0 {
                    BatchOutcome::Succeeded
                } else {
                    BatchOutcome::PartialFailure
                };
                (outcome, result)
            }
            Err(e) => {
                warn!("Bulk request to {} failed: {}; uploading individually", index, e);
                (BatchOutcome::Failed, self.upload_individually(index, batch).await)
            }
        }
    }

    async fn upload_individually(&self, index: &str, batch: &[IndexDocument]) -> UploadResult {
        let mut result = UploadResult::default();
        for doc in batch {
            match self.backend.index_document(index, doc).await {
                Ok(()) => result.success_count += 1,
                Err(e) => {
                    warn!("   individual upload failed for {}: {}", doc.name, e);
                    result.record_error(format!("{} ({}): {}", doc.name, doc.id, e));
                }
            }
        }
        result
    }
}

/// Count per-item outcomes; actions the response does not mention are errors
fn count_items(batch: &[IndexDocument], response: &BulkResponse) -> UploadResult {
    let mut result = UploadResult::default();
    for item in response.items.iter().take(batch.len()) {
        if item.is_success() {
            result.success_count += 1;
        } else {
            let reason = item
                .error
                .clone()
                .unwrap_or_else(|| format!("status {}", item.status));
            warn!("   document {} rejected: {}", item.id, reason);
            result.record_error(format!("{}: {}", item.id, reason));
        }
    }

    let missing = batch.len().saturating_sub(response.items.len());
    for doc in &batch[batch.len() - missing..] {
        result.record_error(format!("{}: no result in bulk response", doc.id));
    }
    result
}
