/// Embedding generation
///
/// - `EmbeddingService` trait over the hosted model, with the
///   OpenAI-compatible implementation
/// - `EmbeddingClient` for pacing, rate-limit retries and the dimension check
/// - `EmbeddingStore` for the intermediate file
mod client;
mod generator;
mod provider;
mod store;

pub use client::EmbeddingClient;
pub use generator::{generate, DroppedRecord, GenerationReport};
pub use provider::{EmbeddingError, EmbeddingService, OpenAiEmbeddingService};
pub use store::EmbeddingStore;

/// Output dimension of `text-embedding-3-small`
pub const DEFAULT_DIMENSION: usize = 1536;

/// Default embedding model
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
