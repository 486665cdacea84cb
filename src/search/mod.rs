/// Search cluster access
///
/// - `SearchBackend` trait: the REST calls the indexer needs
/// - `OpenSearchClient`: HTTP implementation with none/basic/SigV4 auth
/// - `IndexDescriptor`: index settings and mappings per record kind
/// - `IndexManager`: connection test, plugin check, index lifecycle
mod descriptor;
mod manager;
mod sigv4;
mod transport;

pub use descriptor::{AnalyzerSettings, IndexDescriptor, VectorMethod, DEFAULT_STOPTAGS};
pub use manager::{EnsureMode, IndexManager};
pub use sigv4::AwsCredentials;
pub use transport::{AuthMode, OpenSearchClient, TransportConfig};

use crate::document::IndexDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Connection, timeout or gateway failure; the request may succeed later
    #[error("Transport error: {0}")]
    Transport(String),

    /// The cluster answered and refused the request
    #[error("Request rejected ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Invalid response from cluster: {0}")]
    Decode(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl SearchError {
    /// Whether retrying the same request can help
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Transport(_) => true,
            SearchError::Rejected { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

/// Cluster health colour, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Red => "red",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Green => "green",
        };
        f.write_str(s)
    }
}

/// `GET /` summary
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub version: String,
}

/// `GET /_cluster/health` summary
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHealth {
    pub status: HealthStatus,
    pub timed_out: bool,
}

/// Outcome of one action in a bulk response
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub id: String,
    pub status: u16,
    /// `type: reason` when the item was rejected
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Parsed bulk response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// REST operations used against the search cluster
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Cluster name and version
    async fn info(&self) -> Result<ClusterInfo, SearchError>;

    /// Names of the plugins installed on any node
    async fn plugins(&self) -> Result<Vec<String>, SearchError>;

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError>;

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchError>;

    async fn delete_index(&self, index: &str) -> Result<(), SearchError>;

    /// Health of the cluster, or of one index, waiting up to `timeout` for
    /// `wait_for` to be reached
    async fn health(
        &self,
        index: Option<&str>,
        wait_for: Option<HealthStatus>,
        timeout: Duration,
    ) -> Result<ClusterHealth, SearchError>;

    /// Send one bulk request of `index` actions for `docs`
    async fn bulk(&self, index: &str, docs: &[IndexDocument]) -> Result<BulkResponse, SearchError>;

    /// Upsert a single document
    async fn index_document(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError>;

    async fn refresh(&self, index: &str) -> Result<(), SearchError>;

    async fn count(&self, index: &str) -> Result<u64, SearchError>;

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SearchError>;
}
