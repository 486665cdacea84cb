/// Embedding generation over a list of records
use super::{EmbeddingClient, EmbeddingError, EmbeddingStore};
use crate::records::EmbeddableRecord;
use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};

/// Record that could not be embedded
#[derive(Debug)]
pub struct DroppedRecord {
    pub id: String,
    pub name: String,
    pub error: EmbeddingError,
}

/// Result of one generation run
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub total: usize,
    pub embedded: usize,
    pub dropped: Vec<DroppedRecord>,
    pub duration_ms: u64,
}

/// Embed every record in order and push the results into `store`
///
/// Failed records are logged, reported and left out of the store; the run
/// always continues with the next record.
pub async fn generate<R: EmbeddableRecord>(
    client: &EmbeddingClient,
    records: &[R],
    store: &mut EmbeddingStore,
) -> GenerationReport {
    let start = Instant::now();
    let total = records.len();
    let mut report = GenerationReport {
        total,
        ..Default::default()
    };

    info!("Generating embeddings for {} records", total);

    for (i, record) in records.iter().enumerate() {
        let text = record.compose_text();
        info!("[{}/{}] {}", i + 1, total, record.display_name());

        match client.embed(&text).await {
            Ok(embedding) => {
                let created_at = Utc::now().to_rfc3339();
                store.push(record.to_document(embedding, text, created_at));
                report.embedded += 1;
            }
            Err(e) => {
                warn!(
                    "Dropping {} ({}): {}",
                    record.display_name(),
                    record.record_id(),
                    e
                );
                report.dropped.push(DroppedRecord {
                    id: record.record_id().to_string(),
                    name: record.display_name().to_string(),
                    error: e,
                });
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Embedded {}/{} records ({} dropped) in {}ms",
        report.embedded,
        total,
        report.dropped.len(),
        report.duration_ms
    );

    report
}
