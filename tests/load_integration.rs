mod common;

use common::{ingredient_json, test_config, FakeCluster, DIM};
use recipe_indexer::backoff::BackoffPolicy;
use recipe_indexer::config::Config;
use recipe_indexer::document::IndexDocument;
use recipe_indexer::error::{IndexerError, Result};
use recipe_indexer::loader::{BulkLoader, BulkSettings, Validator};
use recipe_indexer::pipeline::{self, LoadOptions, LoadSummary};
use recipe_indexer::records::RecordKind;
use recipe_indexer::search::{EnsureMode, IndexManager, SearchBackend};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

fn settings() -> BulkSettings {
    BulkSettings {
        batch_size: 50,
        batch_pause: Duration::from_millis(10),
        retry: BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(4), 3),
    }
}

fn documents(count: usize) -> Vec<IndexDocument> {
    let stored: Vec<Value> = (1..=count as u64)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    Validator::for_kind(RecordKind::Ingredient, DIM).filter_valid(&stored)
}

async fn create_index(cluster: &FakeCluster, name: &str) {
    cluster.create_index(name, &json!({})).await.unwrap();
}

async fn load_ingredients(
    cluster: &FakeCluster,
    config: &Config,
    mode: EnsureMode,
) -> Result<LoadSummary> {
    let options = LoadOptions { mode, verify: true };
    pipeline::load(cluster, config, &[RecordKind::Ingredient], options).await
}

async fn load_all(cluster: &FakeCluster, config: &Config) -> Result<LoadSummary> {
    let options = LoadOptions {
        mode: EnsureMode::Destructive,
        verify: true,
    };
    pipeline::load(cluster, config, &RecordKind::ALL, options).await
}

#[tokio::test(start_paused = true)]
async fn test_batches_of_fifty() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;

    let docs = documents(101);
    let result = BulkLoader::new(&cluster, settings())
        .load("ingredients", &docs)
        .await;

    assert_eq!(cluster.bulk_sizes(), vec![50, 50, 1]);
    assert_eq!(result.batches, 3);
    assert_eq!(result.success_count, 101);
    assert_eq!(result.error_count, 0);
    assert_eq!(cluster.doc_count("ingredients"), 101);
    println!("✓ 101 documents sent as 50 + 50 + 1");
}

#[tokio::test(start_paused = true)]
async fn test_bad_embedding_isolated_before_upload() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;

    let mut raw: Vec<Value> = (1..=50)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    raw[17]["embedding"] = json!(vec![0.25_f32; 1535]);

    let docs = Validator::for_kind(RecordKind::Ingredient, DIM).filter_valid(&raw);
    assert_eq!(docs.len(), 49);

    let result = BulkLoader::new(&cluster, settings())
        .load("ingredients", &docs)
        .await;

    assert_eq!(cluster.bulk_sizes(), vec![49]);
    assert_eq!(result.success_count, 49);
    assert!(cluster.get("ingredients", "18").is_none());
    println!("✓ Wrong-length embedding skipped, 49 uploaded in one request");
}

#[tokio::test(start_paused = true)]
async fn test_item_rejections_counted_and_sampled() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    for id in 1..=12 {
        cluster.reject_id(&id.to_string());
    }

    let docs = documents(60);
    let result = BulkLoader::new(&cluster, settings())
        .load("ingredients", &docs)
        .await;

    assert_eq!(result.success_count, 48);
    assert_eq!(result.error_count, 12);
    assert_eq!(result.submitted(), docs.len());
    assert_eq!(result.error_samples.len(), 10);
    assert!(result.error_samples[0].starts_with("1: mapper_parsing_exception"));
    println!("✓ Rejected items counted, samples capped at 10");
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    cluster.fail_next_bulk(2);

    let start = tokio::time::Instant::now();
    let docs = documents(10);
    let result = BulkLoader::new(&cluster, settings())
        .load("ingredients", &docs)
        .await;

    assert_eq!(result.success_count, 10);
    assert_eq!(cluster.bulk_sizes(), vec![10]);
    assert_eq!(cluster.single_writes(), 0);
    // backoff of 1s then 2s
    assert!(start.elapsed() >= Duration::from_secs(3));
    println!("✓ Bulk request succeeded on the third attempt");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_batch_falls_back_to_single_writes() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    cluster.fail_next_bulk(3);
    cluster.reject_id("4");

    let docs = documents(5);
    let result = BulkLoader::new(&cluster, settings())
        .load("ingredients", &docs)
        .await;

    assert!(cluster.bulk_sizes().is_empty());
    assert_eq!(cluster.single_writes(), 5);
    assert_eq!(result.success_count, 4);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.success_count + result.error_count, docs.len());
    println!("✓ Failed batch uploaded document by document");
}

#[tokio::test(start_paused = true)]
async fn test_pause_follows_slow_batches() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    cluster.slow_bulk(Duration::from_secs(2));

    let settings = BulkSettings {
        batch_size: 1,
        batch_pause: Duration::from_secs(1),
        ..settings()
    };
    let docs = documents(3);
    let result = BulkLoader::new(&cluster, settings)
        .load("ingredients", &docs)
        .await;
    assert_eq!(result.success_count, 3);

    let spans = cluster.bulk_spans();
    assert_eq!(spans.len(), 3);
    for pair in spans.windows(2) {
        let (_, previous_end) = pair[0];
        let (next_start, _) = pair[1];
        let gap = next_start.saturating_duration_since(previous_end);
        assert!(gap >= Duration::from_secs(1), "gap between batches was {:?}", gap);
    }
    println!("✓ Full pause kept after each 2s batch");
}

#[tokio::test(start_paused = true)]
async fn test_reload_is_idempotent() {
    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    let loader = BulkLoader::new(&cluster, settings());

    let docs = documents(30);
    loader.load("ingredients", &docs).await;
    loader.load("ingredients", &docs).await;

    assert_eq!(cluster.doc_count("ingredients"), 30);
    println!("✓ Loading the same file twice keeps 30 documents");
}

#[tokio::test(start_paused = true)]
async fn test_destructive_and_additive_modes() {
    let cluster = FakeCluster::new();
    let manager = IndexManager::new(&cluster, "localhost", Duration::from_secs(30));
    let config = test_config(TempDir::new().unwrap().path());
    let descriptor = config.descriptor(RecordKind::Ingredient);

    manager
        .ensure_index(&descriptor, EnsureMode::Destructive)
        .await
        .unwrap();
    assert_eq!(cluster.created(), 1);
    assert_eq!(cluster.deleted(), 0);

    cluster.seed("ingredients", "1", json!({"name": "기존"}));

    manager
        .ensure_index(&descriptor, EnsureMode::Additive)
        .await
        .unwrap();
    assert_eq!(cluster.created(), 1);
    assert_eq!(cluster.doc_count("ingredients"), 1);

    manager
        .ensure_index(&descriptor, EnsureMode::Destructive)
        .await
        .unwrap();
    assert_eq!(cluster.deleted(), 1);
    assert_eq!(cluster.created(), 2);
    assert_eq!(cluster.doc_count("ingredients"), 0);

    let body = cluster.index_body("ingredients").unwrap();
    assert_eq!(
        body.pointer("/mappings/properties/embedding/dimension"),
        Some(&json!(1536))
    );
    println!("✓ Additive keeps documents, destructive starts empty");
}

#[tokio::test(start_paused = true)]
async fn test_missing_plugin_aborts_before_any_write() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    common::write_json(
        &config.output.ingredient_embeddings,
        &json!([ingredient_json(1, "밀가루", DIM)]),
    );

    let cluster = FakeCluster::without_plugins();
    let err = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap_err();

    assert!(matches!(err, IndexerError::MissingPlugin { .. }));
    assert_eq!(cluster.created(), 0);
    println!("✓ Missing analysis plugin reported: {}", err);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_cluster() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let cluster = FakeCluster::unreachable();
    let err = load_all(&cluster, &config).await.unwrap_err();

    assert!(matches!(err, IndexerError::ClusterUnavailable { .. }));
    println!("✓ Unreachable cluster reported: {}", err);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_load_and_verify() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let ingredients: Vec<Value> = (1..=3)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    common::write_json(&config.output.ingredient_embeddings, &json!(ingredients));

    let cluster = FakeCluster::new();
    let summary = load_all(&cluster, &config).await.unwrap();

    assert_eq!(summary.loads.len(), 1);
    assert_eq!(summary.skipped, vec![RecordKind::Recipe]);
    let load = &summary.loads[0];
    assert_eq!(load.read, 3);
    assert_eq!(load.submitted, 3);
    assert_eq!(load.upload.success_count, 3);
    assert!(summary.passed());

    let report = summary.verification.unwrap();
    assert!(report.is_healthy(), "problems: {:?}", report.indices);
    assert_eq!(report.indices[0].document_count, Some(3));
    assert_eq!(report.indices[0].sample_dimension, Some(DIM));
    assert_eq!(report.indices[0].lexical_hits, Some(1));
    println!("✓ Loaded and verified ingredients, recipes skipped");
}

#[tokio::test(start_paused = true)]
async fn test_success_threshold() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());

    let ingredients: Vec<Value> = (1..=10)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    common::write_json(&config.output.ingredient_embeddings, &json!(ingredients));

    let cluster = FakeCluster::new();
    cluster.reject_id("10");

    let summary = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap();
    assert_eq!(summary.loads[0].upload.success_count, 9);
    assert!(!summary.passed(), "0.9 is below the default threshold of 1.0");

    config.upload.success_threshold = 0.8;
    let summary = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap();
    assert!(summary.passed());

    cluster.reject_id("9");
    cluster.reject_id("8");
    let summary = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap();
    assert_eq!(summary.below_threshold().len(), 1);
    println!("✓ Threshold applied per index");
}

#[tokio::test(start_paused = true)]
async fn test_accounting_across_stages() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let mut ingredients: Vec<Value> = (1..=20)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    ingredients[0]["embedding"] = json!([]);
    ingredients[1]["embedding"] = Value::Null;
    ingredients[2]["embedding"] = json!("not a vector");
    common::write_json(&config.output.ingredient_embeddings, &json!(ingredients));

    let cluster = FakeCluster::new();
    cluster.reject_id("20");

    let summary = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap();

    let load = &summary.loads[0];
    assert_eq!(load.read, 20);
    assert_eq!(load.rejected(), 3);
    assert_eq!(load.submitted, 17);
    assert_eq!(load.upload.success_count + load.upload.error_count, load.submitted);
    assert_eq!(cluster.doc_count("ingredients"), 16);
    println!("✓ read = rejected + uploaded + failed");
}

#[tokio::test(start_paused = true)]
async fn test_broken_file_keeps_existing_index() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.output.ingredient_embeddings, "{ not json").unwrap();

    let cluster = FakeCluster::new();
    cluster.seed("ingredients", "1", json!({"name": "기존"}));

    let result = load_ingredients(&cluster, &config, EnsureMode::Destructive).await;

    assert!(result.is_err());
    assert_eq!(cluster.deleted(), 0);
    assert_eq!(cluster.doc_count("ingredients"), 1);
    println!("✓ Unreadable file never deletes the index");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_entry_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let mut ingredients: Vec<Value> = (1..=5)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    ingredients[2]["name"] = Value::Null;
    common::write_json(&config.output.ingredient_embeddings, &json!(ingredients));

    let cluster = FakeCluster::new();
    let summary = load_ingredients(&cluster, &config, EnsureMode::Destructive)
        .await
        .unwrap();

    let load = &summary.loads[0];
    assert_eq!(load.read, 5);
    assert_eq!(load.rejected(), 1);
    assert_eq!(load.upload.success_count, 4);
    assert!(cluster.get("ingredients", "3").is_none());
    assert!(summary.passed());
    println!("✓ Entry with a null name skipped, other 4 indexed");
}

#[tokio::test(start_paused = true)]
async fn test_verification_problems_are_advisory() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let ingredients: Vec<Value> = (1..=3)
        .map(|i| ingredient_json(i, &format!("재료{}", i), DIM))
        .collect();
    common::write_json(&config.output.ingredient_embeddings, &json!(ingredients));

    let cluster = FakeCluster::new();
    // an older document with a short vector sorts first and becomes the sample
    cluster.seed("ingredients", "0", ingredient_json(0, "구형", 3));
    cluster.empty_similarity();

    let summary = load_ingredients(&cluster, &config, EnsureMode::Additive)
        .await
        .unwrap();
    assert!(summary.passed());

    let report = summary.verification.unwrap();
    assert!(!report.is_healthy());
    let health = &report.indices[0];
    assert_eq!(health.document_count, Some(4));
    assert_eq!(health.sample_dimension, Some(3));
    assert_eq!(health.similarity_hits, Some(0));
    assert!(health
        .problems
        .contains(&format!("sample embedding has 3 values, expected {}", DIM)));
    assert!(health
        .problems
        .contains(&"similarity search returned no results".to_string()));
    println!("✓ Verification problems reported, load still passed");
}

#[tokio::test(start_paused = true)]
async fn test_verify_survives_failing_searches() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let cluster = FakeCluster::new();
    create_index(&cluster, "ingredients").await;
    cluster.seed("ingredients", "1", ingredient_json(1, "양파", DIM));
    cluster.fail_searches();

    let report = pipeline::verify(&cluster, &config, &["ingredients"]).await;

    let health = &report.indices[0];
    assert_eq!(health.document_count, Some(1));
    assert!(health.sample_name.is_none());
    assert!(health
        .problems
        .iter()
        .any(|p| p.starts_with("sample query failed")));
    assert!(health
        .problems
        .iter()
        .any(|p| p.starts_with("similarity search failed")));
    assert!(!report.is_healthy());
    println!("✓ Failed searches recorded as problems: {:?}", health.problems);
}
