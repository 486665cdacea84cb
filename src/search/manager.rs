/// Index lifecycle against a search backend
use super::{ClusterInfo, HealthStatus, IndexDescriptor, SearchBackend};
use crate::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Plugin providing the Korean tokenizer and part-of-speech filter
pub const ANALYSIS_PLUGIN: &str = "analysis-nori";

/// How `ensure_index` treats an existing index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnsureMode {
    /// Delete the index if present, then create it. Not safe with two
    /// concurrent runs against the same index.
    #[default]
    Destructive,
    /// Create the index only when it does not exist
    Additive,
}

/// Prepares indices before a load
pub struct IndexManager<'a> {
    backend: &'a dyn SearchBackend,
    host: String,
    ready_timeout: Duration,
}

impl<'a> IndexManager<'a> {
    /// Create a new manager
    ///
    /// # Arguments
    /// * `backend` - Cluster to operate on
    /// * `host` - Host name used in diagnostics
    /// * `ready_timeout` - How long to wait for an index to reach yellow
    pub fn new(
        backend: &'a dyn SearchBackend,
        host: impl Into<String>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            host: host.into(),
            ready_timeout,
        }
    }

    /// Check the cluster answers; logs version and cluster name
    pub async fn test_connection(&self) -> Result<ClusterInfo> {
        let info = self
            .backend
            .info()
            .await
            .map_err(|source| IndexerError::ClusterUnavailable {
                host: self.host.clone(),
                source,
            })?;
        info!(
            "Connected to search cluster '{}' (version {}) at {}",
            info.cluster_name, info.version, self.host
        );
        Ok(info)
    }

    /// Fail unless the analysis plugin the index analyzer needs is installed
    pub async fn check_analysis_plugin(&self) -> Result<()> {
        let plugins = self
            .backend
            .plugins()
            .await
            .map_err(|source| IndexerError::ClusterUnavailable {
                host: self.host.clone(),
                source,
            })?;

        if plugins.iter().any(|p| p == ANALYSIS_PLUGIN) {
            info!("Found analysis plugin {}", ANALYSIS_PLUGIN);
            Ok(())
        } else {
            Err(IndexerError::MissingPlugin {
                plugin: ANALYSIS_PLUGIN.to_string(),
            })
        }
    }

    /// Make sure the index described by `descriptor` exists and is ready
    ///
    /// In destructive mode the old index is deleted first, so a failed
    /// create leaves no index behind.
    pub async fn ensure_index(&self, descriptor: &IndexDescriptor, mode: EnsureMode) -> Result<()> {
        let index = descriptor.name.as_str();
        let wrap = |source| IndexerError::IndexCreation {
            index: index.to_string(),
            source,
        };

        let exists = self.backend.index_exists(index).await.map_err(wrap)?;

        match (mode, exists) {
            (EnsureMode::Additive, true) => {
                info!("Index {} already exists, keeping it", index);
            }
            (EnsureMode::Destructive, true) => {
                info!("Deleting existing index {}", index);
                self.backend.delete_index(index).await.map_err(wrap)?;
                self.create(descriptor).await?;
            }
            (_, false) => {
                self.create(descriptor).await?;
            }
        }

        self.wait_ready(index).await
    }

    async fn create(&self, descriptor: &IndexDescriptor) -> Result<()> {
        self.backend
            .create_index(&descriptor.name, &descriptor.to_create_body())
            .await
            .map_err(|source| IndexerError::IndexCreation {
                index: descriptor.name.clone(),
                source,
            })?;
        info!(
            "Created index {} ({} shards, {} replicas, {}-dim vectors)",
            descriptor.name, descriptor.shards, descriptor.replicas, descriptor.dimension
        );
        Ok(())
    }

    async fn wait_ready(&self, index: &str) -> Result<()> {
        let health = self
            .backend
            .health(Some(index), Some(HealthStatus::Yellow), self.ready_timeout)
            .await
            .map_err(|source| IndexerError::IndexCreation {
                index: index.to_string(),
                source,
            })?;

        if health.status < HealthStatus::Yellow {
            warn!("Index {} health is {} after {:?}", index, health.status, self.ready_timeout);
            return Err(IndexerError::IndexCreation {
                index: index.to_string(),
                source: super::SearchError::Rejected {
                    status: 408,
                    reason: format!("index health stayed {}", health.status),
                },
            });
        }
        Ok(())
    }
}
