//! Stage wiring: records → embeddings file → validated documents → index
//!
//! Each stage takes its collaborators explicitly; nothing here holds a
//! global client.

use crate::config::Config;
use crate::embedding::{self, EmbeddingClient, EmbeddingStore, GenerationReport};
use crate::error::Result;
use crate::loader::{BulkLoader, SmokeQuery, UploadResult, Validator, VerificationReport, Verifier};
use crate::records::{load_records, Ingredient, Recipe, RecordKind};
use crate::search::{EnsureMode, IndexManager, SearchBackend};
use std::path::Path;
use tracing::{info, warn};

/// Load the export for `kind`, embed every record and write the embedding file
pub async fn embed_kind(
    config: &Config,
    client: &EmbeddingClient,
    kind: RecordKind,
) -> Result<GenerationReport> {
    embed_file(client, kind, config.input_path(kind), config.embeddings_path(kind)).await
}

/// Embed the records in `input` and write them to `output`
///
/// Nothing is written when no record could be embedded, so an outage never
/// replaces a good file with an empty one.
pub async fn embed_file(
    client: &EmbeddingClient,
    kind: RecordKind,
    input: &Path,
    output: &Path,
) -> Result<GenerationReport> {
    let mut store = EmbeddingStore::new(output);

    let report = match kind {
        RecordKind::Ingredient => {
            let records: Vec<Ingredient> = load_records(input)?;
            embedding::generate(client, &records, &mut store).await
        }
        RecordKind::Recipe => {
            let records: Vec<Recipe> = load_records(input)?;
            embedding::generate(client, &records, &mut store).await
        }
    };

    if store.is_empty() && report.total > 0 {
        warn!("No {} embedded; leaving {} untouched", kind, output.display());
    } else {
        store.flush()?;
    }
    Ok(report)
}

/// Result of loading one record kind
#[derive(Debug, Clone)]
pub struct IndexLoad {
    pub kind: RecordKind,
    pub index: String,
    /// Documents in the embedding file
    pub read: usize,
    /// Documents that passed validation and were submitted
    pub submitted: usize,
    pub upload: UploadResult,
}

impl IndexLoad {
    /// Documents dropped by the validator
    pub fn rejected(&self) -> usize {
        self.read - self.submitted
    }
}

/// Outcome of a whole load run
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub loads: Vec<IndexLoad>,
    /// Kinds whose embedding file was missing
    pub skipped: Vec<RecordKind>,
    pub verification: Option<VerificationReport>,
    pub success_threshold: f64,
}

impl LoadSummary {
    /// Indices whose success ratio fell below the threshold
    pub fn below_threshold(&self) -> Vec<&IndexLoad> {
        self.loads
            .iter()
            .filter(|load| !load.upload.meets_threshold(self.success_threshold))
            .collect()
    }

    /// Whether the run counts as successful; verification does not take part
    pub fn passed(&self) -> bool {
        self.below_threshold().is_empty()
    }
}

/// Options for [`load`]
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub mode: EnsureMode,
    pub verify: bool,
}

/// Connection test, plugin check, then per kind: read file, ensure index,
/// validate, upload. Verification runs last over every loaded index.
pub async fn load(
    backend: &dyn SearchBackend,
    config: &Config,
    kinds: &[RecordKind],
    options: LoadOptions,
) -> Result<LoadSummary> {
    let manager = IndexManager::new(
        backend,
        config.cluster.host.clone(),
        config.ready_timeout()?,
    );
    manager.test_connection().await?;
    manager.check_analysis_plugin().await?;

    let loader = BulkLoader::new(backend, config.bulk_settings()?);
    let mut summary = LoadSummary {
        loads: Vec::new(),
        skipped: Vec::new(),
        verification: None,
        success_threshold: config.upload.success_threshold,
    };

    for &kind in kinds {
        let path = config.embeddings_path(kind);
        if !path.exists() {
            warn!("Embedding file for {} not found: {}", kind, path.display());
            summary.skipped.push(kind);
            continue;
        }
        let stored = EmbeddingStore::load(path)?;

        // the file is read before the index is touched, so a broken file never
        // costs the existing index
        let descriptor = config.descriptor(kind);
        manager.ensure_index(&descriptor, options.mode).await?;

        let validator = Validator::for_kind(kind, config.embedding.dimension);
        let documents = validator.filter_valid(&stored);
        let upload = loader.load(&descriptor.name, &documents).await;

        summary.loads.push(IndexLoad {
            kind,
            index: descriptor.name.clone(),
            read: stored.len(),
            submitted: documents.len(),
            upload,
        });
    }

    if options.verify && !summary.loads.is_empty() {
        let indices: Vec<&str> = summary.loads.iter().map(|l| l.index.as_str()).collect();
        let report = verify(backend, config, &indices).await;
        summary.verification = Some(report);
    }

    info!(
        "Load finished: {} indices, {}",
        summary.loads.len(),
        if summary.passed() { "passed" } else { "below threshold" }
    );
    Ok(summary)
}

/// Advisory checks over `indices`
pub async fn verify(
    backend: &dyn SearchBackend,
    config: &Config,
    indices: &[&str],
) -> VerificationReport {
    let query: SmokeQuery = config.upload.smoke_query;
    Verifier::new(backend, config.embedding.dimension, query)
        .verify(indices)
        .await
}
