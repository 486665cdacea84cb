//! Source records exported from the relational store
//!
//! Each record kind carries its own embedding-text template. The pipeline only
//! sees records through [`EmbeddableRecord`], so adding a kind means adding a
//! type and an impl, not another copy of the pipeline.

use crate::document::{Aliases, DocumentFields, EmbeddingDocument};
use crate::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Category used when an ingredient has none
pub const DEFAULT_CATEGORY: &str = "기타";

/// Source identifier; the export emits numbers for most tables but some
/// recipe sequences arrive as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

/// Record kind; one search index per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Ingredient,
    Recipe,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Recipe, RecordKind::Ingredient];

    /// Name of the id field inside stored and indexed documents
    pub fn id_field(&self) -> &'static str {
        match self {
            RecordKind::Ingredient => "ingredient_id",
            RecordKind::Recipe => "recipe_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Ingredient => "ingredients",
            RecordKind::Recipe => "recipes",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Something that can be turned into embedding text and an embedding document
pub trait EmbeddableRecord {
    /// Canonical embedding text. Must be a pure function of the record.
    fn compose_text(&self) -> String;

    /// Stable identity used as the document id
    fn record_id(&self) -> &RecordId;

    /// Human-readable label for logs
    fn display_name(&self) -> &str;

    fn kind(&self) -> RecordKind;

    /// Build the stored document once an embedding is available
    fn to_document(
        &self,
        embedding: Vec<f32>,
        embedding_text: String,
        created_at: String,
    ) -> EmbeddingDocument;
}

/// Ingredient row with its alias list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_category", deserialize_with = "category_or_default")]
    pub category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn category_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_else(default_category))
}

impl EmbeddableRecord for Ingredient {
    fn compose_text(&self) -> String {
        format!(
            "{} ({}) / {}",
            self.name,
            self.aliases.join(", "),
            self.category
        )
        .trim()
        .to_string()
    }

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Ingredient
    }

    fn to_document(
        &self,
        embedding: Vec<f32>,
        embedding_text: String,
        created_at: String,
    ) -> EmbeddingDocument {
        EmbeddingDocument {
            fields: DocumentFields::Ingredient {
                ingredient_id: self.id.clone(),
                name: self.name.clone(),
                aliases: Aliases::List(self.aliases.clone()),
                category: self.category.clone(),
            },
            embedding,
            embedding_text,
            created_at,
        }
    }
}

/// Recipe row joined with its ingredient names
///
/// Field names follow the export query (`rcp_*` columns of the recipe table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub recipe_id: RecordId,
    pub recipe_name: String,
    /// Comma-joined ingredient names; null when the recipe has no ingredient rows
    #[serde(default, deserialize_with = "null_as_empty")]
    pub processed_ingredients: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rcp_category: String,
    /// Cooking method
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rcp_way2: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hash_tag: String,
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

impl EmbeddableRecord for Recipe {
    fn compose_text(&self) -> String {
        [
            format!("레시피명: {}", self.recipe_name),
            format!("재료: {}", self.processed_ingredients),
            format!("조리법: {}", self.rcp_way2),
            format!("카테고리: {}", self.rcp_category),
            format!("해시태그: {}", self.hash_tag),
        ]
        .join("\n")
        .trim()
        .to_string()
    }

    fn record_id(&self) -> &RecordId {
        &self.recipe_id
    }

    fn display_name(&self) -> &str {
        &self.recipe_name
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Recipe
    }

    fn to_document(
        &self,
        embedding: Vec<f32>,
        embedding_text: String,
        created_at: String,
    ) -> EmbeddingDocument {
        EmbeddingDocument {
            fields: DocumentFields::Recipe {
                recipe_id: self.recipe_id.clone(),
                name: self.recipe_name.clone(),
                ingredients: self.processed_ingredients.clone(),
                category: self.rcp_category.clone(),
                cooking_method: self.rcp_way2.clone(),
                hashtag: self.hash_tag.clone(),
            },
            embedding,
            embedding_text,
            created_at,
        }
    }
}

/// Load an export file (JSON array of records)
pub fn load_records<R>(path: &Path) -> Result<Vec<R>>
where
    R: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path).map_err(|e| IndexerError::Io {
        source: e,
        context: format!("Failed to read input records: {}", path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| IndexerError::Json {
        source: e,
        context: format!("Invalid record file: {}", path.display()),
    })
}
