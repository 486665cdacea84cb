/// Post-load checks; advisory only
use crate::search::{HealthStatus, SearchBackend};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Shape of the similarity smoke query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmokeQuery {
    /// Approximate `knn` query on the vector field
    #[default]
    Knn,
    /// Exact `script_score` with cosine similarity, for clusters where the
    /// `knn` query clause is unavailable
    ScriptScore,
}

/// Findings for one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexHealth {
    pub index: String,
    pub document_count: Option<u64>,
    pub sample_name: Option<String>,
    pub sample_dimension: Option<usize>,
    pub similarity_hits: Option<usize>,
    /// Hits of a `match` query on the sample's name
    pub lexical_hits: Option<usize>,
    pub problems: Vec<String>,
}

impl IndexHealth {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub cluster_health: Option<HealthStatus>,
    pub indices: Vec<IndexHealth>,
}

impl VerificationReport {
    pub fn is_healthy(&self) -> bool {
        self.indices.iter().all(IndexHealth::is_healthy)
    }
}

/// Runs the post-load checks
pub struct Verifier<'a> {
    backend: &'a dyn SearchBackend,
    dimension: usize,
    query: SmokeQuery,
}

impl<'a> Verifier<'a> {
    pub fn new(backend: &'a dyn SearchBackend, dimension: usize, query: SmokeQuery) -> Self {
        Self {
            backend,
            dimension,
            query,
        }
    }

    /// Check each index; never fails, problems end up in the report
    pub async fn verify(&self, indices: &[&str]) -> VerificationReport {
        let mut report = VerificationReport::default();

        match self.backend.health(None, None, Duration::from_secs(5)).await {
            Ok(health) => {
                info!("Cluster health: {}", health.status);
                report.cluster_health = Some(health.status);
            }
            Err(e) => warn!("Could not read cluster health: {}", e),
        }

        for index in indices {
            let health = self.verify_index(index).await;
            if health.is_healthy() {
                info!("{}: verified", index);
            } else {
                for problem in &health.problems {
                    warn!("{}: {}", index, problem);
                }
            }
            report.indices.push(health);
        }

        report
    }

    async fn verify_index(&self, index: &str) -> IndexHealth {
        let mut health = IndexHealth {
            index: index.to_string(),
            ..Default::default()
        };

        if let Err(e) = self.backend.refresh(index).await {
            health.problems.push(format!("refresh failed: {}", e));
        }

        match self.backend.count(index).await {
            Ok(count) => {
                info!("   {}: {} documents", index, count);
                health.document_count = Some(count);
                if count == 0 {
                    health.problems.push("index is empty".to_string());
                }
            }
            Err(e) => health.problems.push(format!("count failed: {}", e)),
        }

        let sample = json!({"query": {"match_all": {}}, "size": 1});
        match self.backend.search(index, &sample).await {
            Ok(response) => match response.hits.first() {
                Some(hit) => {
                    let name = hit.source.get("name").and_then(Value::as_str);
                    let dimension = hit
                        .source
                        .get("embedding")
                        .and_then(Value::as_array)
                        .map(Vec::len)
                        .unwrap_or(0);
                    info!(
                        "   sample: {} ({}-dim embedding)",
                        name.unwrap_or("N/A"),
                        dimension
                    );
                    health.sample_name = name.map(str::to_string);
                    health.sample_dimension = Some(dimension);
                    if dimension != self.dimension {
                        health.problems.push(format!(
                            "sample embedding has {} values, expected {}",
                            dimension, self.dimension
                        ));
                    }
                }
                None => health.problems.push("no sample document".to_string()),
            },
            Err(e) => health.problems.push(format!("sample query failed: {}", e)),
        }

        let query = similarity_query(self.query, self.dimension);
        match self.backend.search(index, &query).await {
            Ok(response) => {
                info!("   similarity search: {} results", response.hits.len());
                health.similarity_hits = Some(response.hits.len());
                if response.hits.is_empty() {
                    health
                        .problems
                        .push("similarity search returned no results".to_string());
                }
            }
            Err(e) => health
                .problems
                .push(format!("similarity search failed: {}", e)),
        }

        if let Some(name) = health.sample_name.clone() {
            let probe = json!({"query": {"match": {"name": name}}, "size": 3});
            match self.backend.search(index, &probe).await {
                Ok(response) => {
                    info!("   keyword search '{}': {} results", name, response.hits.len());
                    health.lexical_hits = Some(response.hits.len());
                }
                Err(e) => health.problems.push(format!("keyword search failed: {}", e)),
            }
        }

        health
    }
}

/// Similarity query against a constant probe vector
pub fn similarity_query(style: SmokeQuery, dimension: usize) -> Value {
    let probe = vec![0.1_f32; dimension];
    match style {
        SmokeQuery::Knn => json!({
            "size": 3,
            "query": {"knn": {"embedding": {"vector": probe, "k": 3}}}
        }),
        SmokeQuery::ScriptScore => json!({
            "size": 3,
            "query": {
                "script_score": {
                    "query": {"match_all": {}},
                    "script": {
                        "source": "cosineSimilarity(params.query_vector, doc['embedding']) + 1.0",
                        "params": {"query_vector": probe}
                    }
                }
            }
        }),
    }
}
