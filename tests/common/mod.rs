//! In-memory stand-ins for the embedding service and the search cluster
#![allow(dead_code)]

use async_trait::async_trait;
use recipe_indexer::config::Config;
use recipe_indexer::document::IndexDocument;
use recipe_indexer::embedding::{EmbeddingError, EmbeddingService};
use recipe_indexer::search::{
    BulkItemResult, BulkResponse, ClusterHealth, ClusterInfo, HealthStatus, SearchBackend,
    SearchError, SearchHit, SearchResponse,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DIM: usize = 1536;

/// Scripted failure for the fake embedding service
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    RateLimited,
    ServerError,
    WrongDimension(usize),
}

impl Scripted {
    fn into_result(self) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            Scripted::RateLimited => Err(EmbeddingError::RateLimited),
            Scripted::ServerError => Err(EmbeddingError::Service {
                status: 500,
                body: "internal error".to_string(),
            }),
            Scripted::WrongDimension(n) => Ok(vec![0.5; n]),
        }
    }
}

/// Embedding service returning deterministic vectors
pub struct FakeEmbeddingService {
    dimension: usize,
    /// Consumed one per call before anything else
    script: Mutex<VecDeque<Scripted>>,
    /// Applied to every call whose text contains the key
    per_text: Mutex<Vec<(String, Scripted)>>,
    calls: AtomicUsize,
}

impl FakeEmbeddingService {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            script: Mutex::new(VecDeque::new()),
            per_text: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, script: Vec<Scripted>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn failing_for(self, text: &str, failure: Scripted) -> Self {
        self.per_text
            .lock()
            .unwrap()
            .push((text.to_string(), failure));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for FakeEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next.into_result();
        }
        let per_text = self.per_text.lock().unwrap();
        if let Some((_, failure)) = per_text.iter().find(|(key, _)| text.contains(key.as_str())) {
            return failure.into_result();
        }

        let seed = (text.chars().count() % 10) as f32 / 10.0;
        Ok(vec![seed; self.dimension])
    }

    fn model_name(&self) -> &str {
        "fake-embedding"
    }
}

#[derive(Debug, Default)]
struct FakeIndex {
    body: Value,
    /// `_id` → source, plus insertion order
    docs: HashMap<String, Value>,
    order: Vec<String>,
}

impl FakeIndex {
    fn upsert(&mut self, id: &str, source: Value) {
        if self.docs.insert(id.to_string(), source).is_none() {
            self.order.push(id.to_string());
        }
    }
}

/// Search cluster kept in memory
pub struct FakeCluster {
    indices: Mutex<HashMap<String, FakeIndex>>,
    plugins: Vec<String>,
    reachable: bool,
    /// Consumed one per bulk call; transport failures before the request lands
    bulk_failures: Mutex<VecDeque<SearchError>>,
    /// Documents the index rejects item by item
    rejected_ids: Mutex<HashSet<String>>,
    bulk_sizes: Mutex<Vec<usize>>,
    /// Each bulk request sleeps this long before answering
    bulk_delay: Mutex<Option<Duration>>,
    /// Start and end of every bulk request
    bulk_spans: Mutex<Vec<(Instant, Instant)>>,
    /// Similarity queries return no hits
    empty_similarity: AtomicBool,
    /// Every search fails
    failing_search: AtomicBool,
    single_writes: AtomicUsize,
    created: AtomicUsize,
    deleted: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            indices: Mutex::new(HashMap::new()),
            plugins: vec!["analysis-nori".to_string(), "opensearch-knn".to_string()],
            reachable: true,
            bulk_failures: Mutex::new(VecDeque::new()),
            rejected_ids: Mutex::new(HashSet::new()),
            bulk_sizes: Mutex::new(Vec::new()),
            bulk_delay: Mutex::new(None),
            bulk_spans: Mutex::new(Vec::new()),
            empty_similarity: AtomicBool::new(false),
            failing_search: AtomicBool::new(false),
            single_writes: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        }
    }

    pub fn without_plugins() -> Self {
        Self {
            plugins: vec!["opensearch-knn".to_string()],
            ..Self::new()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    pub fn fail_next_bulk(&self, times: usize) {
        let mut failures = self.bulk_failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(SearchError::Transport("connection reset by peer".to_string()));
        }
    }

    pub fn slow_bulk(&self, delay: Duration) {
        *self.bulk_delay.lock().unwrap() = Some(delay);
    }

    pub fn empty_similarity(&self) {
        self.empty_similarity.store(true, Ordering::SeqCst);
    }

    pub fn fail_searches(&self) {
        self.failing_search.store(true, Ordering::SeqCst);
    }

    pub fn bulk_spans(&self) -> Vec<(Instant, Instant)> {
        self.bulk_spans.lock().unwrap().clone()
    }

    pub fn reject_id(&self, id: &str) {
        self.rejected_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.bulk_sizes.lock().unwrap().clone()
    }

    pub fn single_writes(&self) -> usize {
        self.single_writes.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.docs.len())
            .unwrap_or(0)
    }

    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .and_then(|i| i.docs.get(id).cloned())
    }

    pub fn index_body(&self, index: &str) -> Option<Value> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.body.clone())
    }

    /// Put a document straight into an index, creating it if needed
    pub fn seed(&self, index: &str, id: &str, source: Value) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .upsert(id, source);
    }

    fn check_reachable(&self) -> Result<(), SearchError> {
        if self.reachable {
            Ok(())
        } else {
            Err(SearchError::Transport("connection refused".to_string()))
        }
    }

    fn missing(index: &str) -> SearchError {
        SearchError::Rejected {
            status: 404,
            reason: format!("no such index [{}]", index),
        }
    }
}

#[async_trait]
impl SearchBackend for FakeCluster {
    async fn info(&self) -> Result<ClusterInfo, SearchError> {
        self.check_reachable()?;
        Ok(ClusterInfo {
            cluster_name: "fake-cluster".to_string(),
            version: "2.11.0".to_string(),
        })
    }

    async fn plugins(&self) -> Result<Vec<String>, SearchError> {
        self.check_reachable()?;
        Ok(self.plugins.clone())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        self.check_reachable()?;
        Ok(self.indices.lock().unwrap().contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchError> {
        self.check_reachable()?;
        let mut indices = self.indices.lock().unwrap();
        if indices.contains_key(index) {
            return Err(SearchError::Rejected {
                status: 400,
                reason: format!("resource_already_exists_exception: [{}]", index),
            });
        }
        indices.insert(
            index.to_string(),
            FakeIndex {
                body: body.clone(),
                ..Default::default()
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchError> {
        self.check_reachable()?;
        self.indices
            .lock()
            .unwrap()
            .remove(index)
            .ok_or_else(|| Self::missing(index))?;
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health(
        &self,
        _index: Option<&str>,
        _wait_for: Option<HealthStatus>,
        _timeout: Duration,
    ) -> Result<ClusterHealth, SearchError> {
        self.check_reachable()?;
        Ok(ClusterHealth {
            status: HealthStatus::Green,
            timed_out: false,
        })
    }

    async fn bulk(&self, index: &str, docs: &[IndexDocument]) -> Result<BulkResponse, SearchError> {
        self.check_reachable()?;
        let started = Instant::now();
        let delay = *self.bulk_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.bulk_failures.lock().unwrap().pop_front() {
            return Err(failure);
        }
        self.bulk_sizes.lock().unwrap().push(docs.len());
        self.bulk_spans.lock().unwrap().push((started, Instant::now()));

        let rejected = self.rejected_ids.lock().unwrap().clone();
        let mut indices = self.indices.lock().unwrap();
        let target = indices.get_mut(index).ok_or_else(|| Self::missing(index))?;

        let mut response = BulkResponse::default();
        for doc in docs {
            if rejected.contains(&doc.id) {
                response.errors = true;
                response.items.push(BulkItemResult {
                    id: doc.id.clone(),
                    status: 400,
                    error: Some("mapper_parsing_exception: failed to parse".to_string()),
                });
            } else {
                target.upsert(&doc.id, doc.source.clone());
                response.items.push(BulkItemResult {
                    id: doc.id.clone(),
                    status: 201,
                    error: None,
                });
            }
        }
        Ok(response)
    }

    async fn index_document(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError> {
        self.check_reachable()?;
        self.single_writes.fetch_add(1, Ordering::SeqCst);
        if self.rejected_ids.lock().unwrap().contains(&doc.id) {
            return Err(SearchError::Rejected {
                status: 400,
                reason: "mapper_parsing_exception".to_string(),
            });
        }
        let mut indices = self.indices.lock().unwrap();
        let target = indices.get_mut(index).ok_or_else(|| Self::missing(index))?;
        target.upsert(&doc.id, doc.source.clone());
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchError> {
        self.check_reachable()?;
        if self.indices.lock().unwrap().contains_key(index) {
            Ok(())
        } else {
            Err(Self::missing(index))
        }
    }

    async fn count(&self, index: &str) -> Result<u64, SearchError> {
        self.check_reachable()?;
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.docs.len() as u64)
            .ok_or_else(|| Self::missing(index))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SearchError> {
        self.check_reachable()?;
        if self.failing_search.load(Ordering::SeqCst) {
            return Err(SearchError::Rejected {
                status: 500,
                reason: "search_phase_execution_exception".to_string(),
            });
        }
        let indices = self.indices.lock().unwrap();
        let target = indices.get(index).ok_or_else(|| Self::missing(index))?;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        let similarity = body.pointer("/query/knn").is_some()
            || body.pointer("/query/script_score").is_some();
        if similarity && self.empty_similarity.load(Ordering::SeqCst) {
            return Ok(SearchResponse::default());
        }

        let name_filter = body
            .pointer("/query/match/name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let hits: Vec<SearchHit> = target
            .order
            .iter()
            .filter_map(|id| target.docs.get(id).map(|source| (id, source)))
            .filter(|(_, source)| match &name_filter {
                Some(name) => source
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|n| n.contains(name.as_str()))
                    .unwrap_or(false),
                None => true,
            })
            .map(|(id, source)| SearchHit {
                id: id.clone(),
                score: Some(1.0),
                source: source.clone(),
            })
            .collect();

        Ok(SearchResponse {
            total: hits.len() as u64,
            hits: hits.into_iter().take(size).collect(),
        })
    }
}

/// Config pointing its files at `dir`, with short pauses
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.input.ingredients_file = dir.join("ingredients.json");
    config.input.recipes_file = dir.join("recipes.json");
    config.output.ingredient_embeddings = dir.join("ingredient_embeddings.json");
    config.output.recipe_embeddings = dir.join("recipe_embeddings.json");
    config.upload.batch_pause = "10ms".to_string();
    config.upload.initial_backoff = "1s".to_string();
    config.upload.max_backoff = "4s".to_string();
    config.upload.max_attempts = 3;
    config
}

/// A stored ingredient document as the generator would write it
pub fn ingredient_json(id: u64, name: &str, dimension: usize) -> Value {
    serde_json::json!({
        "ingredient_id": id,
        "name": name,
        "aliases": [format!("{}-별칭", name)],
        "category": "채소류",
        "embedding": vec![0.25_f32; dimension],
        "embedding_text": format!("{} ({}-별칭) / 채소류", name, name),
        "created_at": "2025-07-01T10:00:00+00:00"
    })
}

pub fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}
