//! recipe-indexer - embedding generation and bulk indexing for recipe search
//!
//! Turns exported ingredient and recipe records into vector embeddings with a
//! hosted embedding model, keeps them in an intermediate JSON file, and loads
//! them into an OpenSearch-compatible cluster that serves both keyword and
//! nearest-neighbour queries.

pub mod backoff;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod records;
pub mod search;

pub use error::{IndexerError, Result};
