//! Configuration management for the indexer
//!
//! One TOML file describes inputs, the embedding service, the search cluster,
//! the index layout and upload behaviour. Named profiles override the cluster
//! part so the same file serves a local cluster and a managed domain.

use crate::backoff::BackoffPolicy;
use crate::error::{IndexerError, Result};
use crate::loader::{BulkSettings, SmokeQuery};
use crate::records::RecordKind;
use crate::search::{
    AnalyzerSettings, AuthMode, AwsCredentials, EnsureMode, IndexDescriptor, TransportConfig,
    VectorMethod, DEFAULT_STOPTAGS,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Schema version understood by this build
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub embedding: EmbeddingConfig,
    pub cluster: ClusterConfig,
    pub index: IndexConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Exported source records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub ingredients_file: PathBuf,
    pub recipes_file: PathBuf,
}

/// Intermediate embedding files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub ingredient_embeddings: PathBuf,
    pub recipe_embeddings: PathBuf,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Minimum interval between service calls
    pub request_delay: String,
    /// Wait after a rate-limit response
    pub retry_delay: String,
    /// Attempts per text, first one included
    pub max_attempts: u32,
    pub timeout: String,
}

/// Search cluster connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub verify_certs: bool,
    pub timeout: String,
    /// "none", "basic" or "aws_sigv4"
    pub auth: String,
    pub username_env: String,
    pub password_env: String,
    pub region: String,
    pub service: String,
    /// How long to wait for a new index to become ready
    pub ready_timeout: String,
}

/// Index names and layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub ingredients: String,
    pub recipes: String,
    pub shards: u32,
    pub replicas: u32,
    pub ef_search: u32,
    pub ef_construction: u32,
    pub m: u32,
    pub engine: String,
    pub space_type: String,
    #[serde(default = "default_stoptags")]
    pub stoptags: Vec<String>,
}

fn default_stoptags() -> Vec<String> {
    DEFAULT_STOPTAGS.iter().map(|s| s.to_string()).collect()
}

/// Upload behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub batch_size: usize,
    pub batch_pause: String,
    /// Bulk request attempts, first one included
    pub max_attempts: u32,
    pub initial_backoff: String,
    pub max_backoff: String,
    /// Minimum indexed fraction per index for the run to count as successful
    pub success_threshold: f64,
    pub mode: EnsureMode,
    pub smoke_query: SmokeQuery,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_certs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_pause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoke_query: Option<SmokeQuery>,
}

/// Parse a duration string such as `"500ms"`, `"5s"`, `"10m"`, `"1h"` or a
/// bare number of seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let re = Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(ms|s|m|h)?\s*$").ok()?;
    let caps = re.captures(s)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let secs = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => value / 1000.0,
        Some("m") => value * 60.0,
        Some("h") => value * 3600.0,
        _ => value,
    };
    Duration::try_from_secs_f64(secs).ok()
}

fn duration_at(path: &str, value: &str) -> Result<Duration> {
    parse_duration(value).ok_or_else(|| IndexerError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Invalid duration format: {}", value),
    })
}

fn required_env(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| IndexerError::MissingCredentials {
            var: var.to_string(),
        })
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IndexerError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| IndexerError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| IndexerError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(host) = overrides.host {
            self.cluster.host = host;
        }
        if let Some(port) = overrides.port {
            self.cluster.port = port;
        }
        if let Some(use_tls) = overrides.use_tls {
            self.cluster.use_tls = use_tls;
        }
        if let Some(verify_certs) = overrides.verify_certs {
            self.cluster.verify_certs = verify_certs;
        }
        if let Some(auth) = overrides.auth {
            self.cluster.auth = auth;
        }
        if let Some(replicas) = overrides.replicas {
            self.index.replicas = replicas;
        }
        if let Some(pause) = overrides.batch_pause {
            self.upload.batch_pause = pause;
        }
        if let Some(attempts) = overrides.max_attempts {
            self.upload.max_attempts = attempts;
        }
        if let Some(backoff) = overrides.initial_backoff {
            self.upload.initial_backoff = backoff;
        }
        if let Some(backoff) = overrides.max_backoff {
            self.upload.max_backoff = backoff;
        }
        if let Some(threshold) = overrides.success_threshold {
            self.upload.success_threshold = threshold;
        }
        if let Some(query) = overrides.smoke_query {
            self.upload.smoke_query = query;
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RECIPE_INDEXER_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("RECIPE_INDEXER_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |kind: &str| IndexerError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as {}", value, kind),
        };

        match path {
            "CLUSTER__HOST" => self.cluster.host = value.to_string(),
            "CLUSTER__PORT" => self.cluster.port = value.parse().map_err(|_| invalid("port"))?,
            "CLUSTER__USE_TLS" => {
                self.cluster.use_tls = value.parse().map_err(|_| invalid("boolean"))?
            }
            "CLUSTER__VERIFY_CERTS" => {
                self.cluster.verify_certs = value.parse().map_err(|_| invalid("boolean"))?
            }
            "CLUSTER__AUTH" => self.cluster.auth = value.to_string(),
            "CLUSTER__REGION" => self.cluster.region = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BASE_URL" => self.embedding.base_url = value.to_string(),
            "EMBEDDING__REQUEST_DELAY" => self.embedding.request_delay = value.to_string(),
            "UPLOAD__BATCH_SIZE" => {
                self.upload.batch_size = value.parse().map_err(|_| invalid("integer"))?
            }
            "UPLOAD__SUCCESS_THRESHOLD" => {
                self.upload.success_threshold = value.parse().map_err(|_| invalid("number"))?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| IndexerError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("recipe-indexer").join("config.toml"))
    }

    /// Embedding file for a record kind
    pub fn embeddings_path(&self, kind: RecordKind) -> &Path {
        match kind {
            RecordKind::Ingredient => &self.output.ingredient_embeddings,
            RecordKind::Recipe => &self.output.recipe_embeddings,
        }
    }

    /// Source record file for a record kind
    pub fn input_path(&self, kind: RecordKind) -> &Path {
        match kind {
            RecordKind::Ingredient => &self.input.ingredients_file,
            RecordKind::Recipe => &self.input.recipes_file,
        }
    }

    pub fn index_name(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Ingredient => &self.index.ingredients,
            RecordKind::Recipe => &self.index.recipes,
        }
    }

    /// Index settings for a record kind
    pub fn descriptor(&self, kind: RecordKind) -> IndexDescriptor {
        let mut descriptor = IndexDescriptor::for_kind(kind, self.index_name(kind));
        descriptor.dimension = self.embedding.dimension;
        descriptor.shards = self.index.shards;
        descriptor.replicas = self.index.replicas;
        descriptor.ef_search = self.index.ef_search;
        descriptor.analyzer = AnalyzerSettings {
            stoptags: self.index.stoptags.clone(),
            ..AnalyzerSettings::default()
        };
        descriptor.method = VectorMethod {
            engine: self.index.engine.clone(),
            space_type: self.index.space_type.clone(),
            ef_construction: self.index.ef_construction,
            m: self.index.m,
            ..VectorMethod::default()
        };
        descriptor
    }

    pub fn request_delay(&self) -> Result<Duration> {
        duration_at("embedding.request_delay", &self.embedding.request_delay)
    }

    /// Fixed-delay policy for rate-limited embedding calls
    pub fn embedding_retry(&self) -> Result<BackoffPolicy> {
        let delay = duration_at("embedding.retry_delay", &self.embedding.retry_delay)?;
        Ok(BackoffPolicy::fixed(delay, self.embedding.max_attempts))
    }

    pub fn embedding_timeout(&self) -> Result<Duration> {
        duration_at("embedding.timeout", &self.embedding.timeout)
    }

    /// API key read from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        required_env(&self.embedding.api_key_env)
    }

    pub fn transport(&self) -> Result<TransportConfig> {
        Ok(TransportConfig {
            host: self.cluster.host.clone(),
            port: self.cluster.port,
            use_tls: self.cluster.use_tls,
            verify_certs: self.cluster.verify_certs,
            timeout: duration_at("cluster.timeout", &self.cluster.timeout)?,
        })
    }

    pub fn ready_timeout(&self) -> Result<Duration> {
        duration_at("cluster.ready_timeout", &self.cluster.ready_timeout)
    }

    /// Authentication with secrets resolved from the environment
    pub fn auth_mode(&self) -> Result<AuthMode> {
        match self.cluster.auth.as_str() {
            "none" => Ok(AuthMode::None),
            "basic" => Ok(AuthMode::Basic {
                username: required_env(&self.cluster.username_env)?,
                password: required_env(&self.cluster.password_env)?,
            }),
            "aws_sigv4" => {
                let credentials = AwsCredentials::from_env()
                    .map_err(|var| IndexerError::MissingCredentials { var })?;
                Ok(AuthMode::AwsSigV4 {
                    region: self.cluster.region.clone(),
                    service: self.cluster.service.clone(),
                    credentials,
                })
            }
            other => Err(IndexerError::InvalidConfigValue {
                path: "cluster.auth".to_string(),
                message: format!("Unknown auth mode: {}", other),
            }),
        }
    }

    pub fn bulk_settings(&self) -> Result<BulkSettings> {
        Ok(BulkSettings {
            batch_size: self.upload.batch_size,
            batch_pause: duration_at("upload.batch_pause", &self.upload.batch_pause)?,
            retry: BackoffPolicy::exponential(
                duration_at("upload.initial_backoff", &self.upload.initial_backoff)?,
                duration_at("upload.max_backoff", &self.upload.max_backoff)?,
                self.upload.max_attempts,
            ),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");

        let mut profiles = HashMap::new();
        profiles.insert(
            "local".to_string(),
            ProfileOverrides {
                host: Some("localhost".to_string()),
                port: Some(9201),
                use_tls: Some(false),
                verify_certs: Some(false),
                auth: Some("none".to_string()),
                replicas: Some(0),
                batch_pause: Some("500ms".to_string()),
                max_attempts: Some(3),
                initial_backoff: Some("1s".to_string()),
                max_backoff: Some("60s".to_string()),
                success_threshold: Some(0.8),
                smoke_query: Some(SmokeQuery::ScriptScore),
            },
        );
        profiles.insert(
            "managed".to_string(),
            ProfileOverrides {
                port: Some(443),
                use_tls: Some(true),
                verify_certs: Some(true),
                auth: Some("basic".to_string()),
                replicas: Some(2),
                batch_pause: Some("1s".to_string()),
                max_attempts: Some(5),
                initial_backoff: Some("2s".to_string()),
                max_backoff: Some("600s".to_string()),
                success_threshold: Some(1.0),
                smoke_query: Some(SmokeQuery::Knn),
                ..Default::default()
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            input: InputConfig {
                ingredients_file: data_dir.join("ingredients.json"),
                recipes_file: data_dir.join("recipes.json"),
            },
            output: OutputConfig {
                ingredient_embeddings: data_dir.join("ingredient_embeddings.json"),
                recipe_embeddings: data_dir.join("recipe_embeddings.json"),
            },
            embedding: EmbeddingConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: crate::embedding::DEFAULT_MODEL.to_string(),
                dimension: crate::embedding::DEFAULT_DIMENSION,
                api_key_env: "OPENAI_API_KEY".to_string(),
                request_delay: "500ms".to_string(),
                retry_delay: "5s".to_string(),
                max_attempts: 3,
                timeout: "30s".to_string(),
            },
            cluster: ClusterConfig {
                host: "localhost".to_string(),
                port: 9200,
                use_tls: false,
                verify_certs: true,
                timeout: "60s".to_string(),
                auth: "none".to_string(),
                username_env: "OPENSEARCH_USERNAME".to_string(),
                password_env: "OPENSEARCH_PASSWORD".to_string(),
                region: "ap-northeast-2".to_string(),
                service: "es".to_string(),
                ready_timeout: "30s".to_string(),
            },
            index: IndexConfig {
                ingredients: "ingredients".to_string(),
                recipes: "recipes".to_string(),
                shards: 1,
                replicas: 0,
                ef_search: 100,
                ef_construction: 128,
                m: 24,
                engine: "nmslib".to_string(),
                space_type: "cosinesimil".to_string(),
                stoptags: default_stoptags(),
            },
            upload: UploadConfig {
                batch_size: 50,
                batch_pause: "1s".to_string(),
                max_attempts: 5,
                initial_backoff: "2s".to_string(),
                max_backoff: "600s".to_string(),
                success_threshold: 1.0,
                mode: EnsureMode::Destructive,
                smoke_query: SmokeQuery::Knn,
            },
            profiles,
        }
    }
}
