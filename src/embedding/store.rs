/// Intermediate embedding file
use crate::document::EmbeddingDocument;
use crate::error::{IndexerError, Result};
use ahash::AHashMap;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-memory accumulator for generated documents, written once at the end
///
/// Documents are keyed by record id: pushing an id again replaces the earlier
/// document in place, so insertion order is kept and no id appears twice.
pub struct EmbeddingStore {
    path: PathBuf,
    documents: Vec<EmbeddingDocument>,
    positions: AHashMap<String, usize>,
}

impl EmbeddingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            documents: Vec::new(),
            positions: AHashMap::new(),
        }
    }

    /// Add or replace a document
    pub fn push(&mut self, document: EmbeddingDocument) {
        let key = document.fields.record_id().to_string();
        match self.positions.get(&key) {
            Some(&position) => {
                debug!("Replacing stored document {}", key);
                self.documents[position] = document;
            }
            None => {
                self.positions.insert(key, self.documents.len());
                self.documents.push(document);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[EmbeddingDocument] {
        &self.documents
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all documents atomically
    ///
    /// The file is written next to the target and renamed over it, so readers
    /// see either the previous file or the complete new one.
    pub fn flush(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to create output directory: {}", parent.display()),
        })?;

        let content =
            serde_json::to_string_pretty(&self.documents).map_err(|e| IndexerError::Json {
                source: e,
                context: "Failed to serialize embedding documents".to_string(),
            })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "embeddings.json".to_string());
        let temp_path = parent.join(format!(".{}.tmp", file_name));

        let write_temp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            Ok(())
        };
        write_temp().map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to write {}", temp_path.display()),
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to move embeddings into {}", self.path.display()),
        })?;

        info!(
            "Saved {} embedding documents to {}",
            self.documents.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read an embedding file back in file order
    ///
    /// Only the outer array is checked here. Entries come back untouched so a
    /// malformed one can be rejected on its own by the validator.
    pub fn load(path: &Path) -> Result<Vec<Value>> {
        if !path.exists() {
            return Err(IndexerError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                context: format!("Embedding file not found: {}", path.display()),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to read embedding file: {}", path.display()),
        })?;

        let documents: Vec<Value> =
            serde_json::from_str(&content).map_err(|e| IndexerError::Json {
                source: e,
                context: format!("Invalid embedding file: {}", path.display()),
            })?;

        info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(documents)
    }
}
