//! Embedding documents as written to the intermediate file and read back
//!
//! Three shapes of the same document:
//! - [`EmbeddingDocument`]: produced by the generator, strictly typed
//! - [`StoredDocument`]: what the loader reads back from disk; nothing about
//!   the embedding is trusted until the validator has looked at it
//! - [`IndexDocument`]: validated, upload-ready body plus its `_id`

use crate::records::{null_as_empty, RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Alias list as found in the file: a list from the generator, a plain string
/// when the file was already flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aliases {
    List(Vec<String>),
    Text(String),
}

impl Default for Aliases {
    fn default() -> Self {
        Aliases::List(Vec::new())
    }
}

impl Aliases {
    /// Space-joined form used by the lexical `aliases` field
    pub fn to_index_text(&self) -> String {
        match self {
            Aliases::List(items) => items.join(" "),
            Aliases::Text(text) => text.clone(),
        }
    }
}

/// Record-specific part of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentFields {
    Ingredient {
        ingredient_id: RecordId,
        name: String,
        #[serde(default)]
        aliases: Aliases,
        #[serde(default, deserialize_with = "null_as_empty")]
        category: String,
    },
    Recipe {
        recipe_id: RecordId,
        name: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        ingredients: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        category: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        cooking_method: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        hashtag: String,
    },
}

impl DocumentFields {
    pub fn kind(&self) -> RecordKind {
        match self {
            DocumentFields::Ingredient { .. } => RecordKind::Ingredient,
            DocumentFields::Recipe { .. } => RecordKind::Recipe,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            DocumentFields::Ingredient { ingredient_id, .. } => ingredient_id,
            DocumentFields::Recipe { recipe_id, .. } => recipe_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DocumentFields::Ingredient { name, .. } | DocumentFields::Recipe { name, .. } => name,
        }
    }

    /// Label used in log lines: the name, falling back to the id
    pub fn label(&self) -> String {
        if self.name().trim().is_empty() {
            self.record_id().to_string()
        } else {
            self.name().to_string()
        }
    }
}

/// Generator output, one per successfully embedded record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    #[serde(flatten)]
    pub fields: DocumentFields,
    pub embedding: Vec<f32>,
    pub embedding_text: String,
    /// RFC 3339 timestamp of generation
    pub created_at: String,
}

/// Document read back from the intermediate file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub fields: DocumentFields,
    /// Raw value; shape is checked by the validator
    #[serde(default)]
    pub embedding: Option<Value>,
    #[serde(default)]
    pub embedding_text: String,
    #[serde(default)]
    pub created_at: String,
}

impl From<EmbeddingDocument> for StoredDocument {
    fn from(doc: EmbeddingDocument) -> Self {
        Self {
            fields: doc.fields,
            embedding: Some(json!(doc.embedding)),
            embedding_text: doc.embedding_text,
            created_at: doc.created_at,
        }
    }
}

/// Validated document ready for a bulk action
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Source id, stringified for `_id`
    pub id: String,
    pub kind: RecordKind,
    /// Name kept for error samples and logs
    pub name: String,
    /// `_source` body sent to the index
    pub source: Value,
}

impl IndexDocument {
    /// Build the index body from a stored document and its checked vector
    pub(crate) fn from_parts(doc: &StoredDocument, embedding: Vec<f32>) -> Self {
        // the mapping types created_at as a date, which rejects ""
        let created_at = if doc.created_at.trim().is_empty() {
            Value::Null
        } else {
            Value::String(doc.created_at.clone())
        };
        let source = match &doc.fields {
            DocumentFields::Ingredient {
                ingredient_id,
                name,
                aliases,
                category,
            } => json!({
                "ingredient_id": ingredient_id,
                "name": name,
                "aliases": aliases.to_index_text(),
                "category": category,
                "embedding": embedding,
                "embedding_text": doc.embedding_text,
                "created_at": created_at,
            }),
            DocumentFields::Recipe {
                recipe_id,
                name,
                ingredients,
                category,
                cooking_method,
                hashtag,
            } => json!({
                "recipe_id": recipe_id,
                "name": name,
                "ingredients": ingredients,
                "category": category,
                "cooking_method": cooking_method,
                "hashtag": hashtag,
                "embedding": embedding,
                "embedding_text": doc.embedding_text,
                "created_at": created_at,
            }),
        };

        Self {
            id: doc.fields.record_id().to_string(),
            kind: doc.fields.kind(),
            name: doc.fields.label(),
            source,
        }
    }

    /// Dimension of the embedding inside the body
    pub fn embedding_len(&self) -> usize {
        self.source
            .get("embedding")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
