/// Pre-upload checks on documents read back from the embedding file
use crate::document::{IndexDocument, StoredDocument};
use crate::records::RecordKind;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

/// Why a document was left out of the upload
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Entry does not have the shape of a stored document
    Malformed { reason: String },
    MissingEmbedding,
    NotAnArray,
    WrongDimension { expected: usize, actual: usize },
    NonNumeric { position: usize },
    WrongKind { expected: RecordKind, actual: RecordKind },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed { reason } => write!(f, "malformed document: {}", reason),
            Rejection::MissingEmbedding => write!(f, "embedding missing"),
            Rejection::NotAnArray => write!(f, "embedding is not an array"),
            Rejection::WrongDimension { expected, actual } => {
                write!(f, "embedding has {} values, expected {}", actual, expected)
            }
            Rejection::NonNumeric { position } => {
                write!(f, "embedding value at {} is not a finite number", position)
            }
            Rejection::WrongKind { expected, actual } => {
                write!(f, "{} document in a {} file", actual, expected)
            }
        }
    }
}

/// Filters stored documents down to the ones safe to upload
pub struct Validator {
    kind: RecordKind,
    dimension: usize,
}

impl Validator {
    pub fn for_kind(kind: RecordKind, dimension: usize) -> Self {
        Self { kind, dimension }
    }

    /// Check one document and build its index body
    pub fn check(&self, doc: &StoredDocument) -> Result<IndexDocument, Rejection> {
        let actual = doc.fields.kind();
        if actual != self.kind {
            return Err(Rejection::WrongKind {
                expected: self.kind,
                actual,
            });
        }

        let values = match &doc.embedding {
            None | Some(Value::Null) => return Err(Rejection::MissingEmbedding),
            Some(Value::Array(values)) => values,
            Some(_) => return Err(Rejection::NotAnArray),
        };
        if values.len() != self.dimension {
            return Err(Rejection::WrongDimension {
                expected: self.dimension,
                actual: values.len(),
            });
        }

        let mut embedding = Vec::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            // bools and strings are not numbers here, even if they would coerce
            match value.as_f64() {
                Some(v) if v.is_finite() => embedding.push(v as f32),
                _ => return Err(Rejection::NonNumeric { position }),
            }
        }

        Ok(IndexDocument::from_parts(doc, embedding))
    }

    /// Check one raw entry of the embedding file
    pub fn check_value(&self, value: &Value) -> Result<IndexDocument, Rejection> {
        let doc = StoredDocument::deserialize(value).map_err(|e| Rejection::Malformed {
            reason: e.to_string(),
        })?;
        self.check(&doc)
    }

    /// Keep the entries that pass [`Validator::check_value`], in input order
    pub fn filter_valid(&self, docs: &[Value]) -> Vec<IndexDocument> {
        let valid: Vec<IndexDocument> = docs
            .iter()
            .enumerate()
            .filter_map(|(position, doc)| match self.check_value(doc) {
                Ok(valid) => Some(valid),
                Err(reason) => {
                    warn!("Skipping {}: {}", self.describe(position, doc), reason);
                    None
                }
            })
            .collect();

        info!("Valid {} documents: {}/{}", self.kind, valid.len(), docs.len());
        valid
    }

    /// Name, id or file position of an entry, for log lines
    fn describe(&self, position: usize, doc: &Value) -> String {
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            if !name.trim().is_empty() {
                return name.to_string();
            }
        }
        match doc.get(self.kind.id_field()) {
            Some(Value::Null) | None => format!("entry #{}", position + 1),
            Some(id) => format!("{} {}", self.kind.id_field(), id),
        }
    }
}
