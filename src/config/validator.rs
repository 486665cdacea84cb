use crate::config::{parse_duration, Config, SCHEMA_VERSION};
use crate::error::{IndexerError, Result, ValidationError};

const AUTH_MODES: [&str; 3] = ["none", "basic", "aws_sigv4"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_paths(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_cluster(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_upload(config, &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(IndexerError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_paths(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when a command needs the file; `embed` creates
        // the output files and `load` does not read the inputs.
        let paths = [
            ("input.ingredients_file", &config.input.ingredients_file),
            ("input.recipes_file", &config.input.recipes_file),
            ("output.ingredient_embeddings", &config.output.ingredient_embeddings),
            ("output.recipe_embeddings", &config.output.recipe_embeddings),
        ];
        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(key, "Path cannot be empty"));
            }
        }

        if config.output.ingredient_embeddings == config.output.recipe_embeddings {
            errors.push(ValidationError::new(
                "output.recipe_embeddings",
                "Ingredient and recipe embeddings must be written to different files",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if !embedding.base_url.starts_with("http://") && !embedding.base_url.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "embedding.base_url",
                format!("Base URL must be http(s), got '{}'", embedding.base_url),
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if embedding.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "embedding.api_key_env",
                "API key variable name cannot be empty",
            ));
        }

        if embedding.max_attempts == 0 {
            errors.push(ValidationError::new(
                "embedding.max_attempts",
                "At least one attempt is required",
            ));
        }

        Self::check_duration("embedding.request_delay", &embedding.request_delay, errors);
        Self::check_duration("embedding.retry_delay", &embedding.retry_delay, errors);
        Self::check_duration("embedding.timeout", &embedding.timeout, errors);
    }

    fn validate_cluster(config: &Config, errors: &mut Vec<ValidationError>) {
        let cluster = &config.cluster;

        if cluster.host.trim().is_empty() {
            errors.push(ValidationError::new("cluster.host", "Host cannot be empty"));
        }

        if cluster.port == 0 {
            errors.push(ValidationError::new("cluster.port", "Port cannot be 0"));
        }

        Self::check_auth("cluster.auth", &cluster.auth, errors);

        if cluster.auth == "aws_sigv4" && cluster.region.is_empty() {
            errors.push(ValidationError::new(
                "cluster.region",
                "Region is required for aws_sigv4 auth",
            ));
        }

        Self::check_duration("cluster.timeout", &cluster.timeout, errors);
        Self::check_duration("cluster.ready_timeout", &cluster.ready_timeout, errors);
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let index = &config.index;

        for (key, name) in [
            ("index.ingredients", &index.ingredients),
            ("index.recipes", &index.recipes),
        ] {
            if name.is_empty() {
                errors.push(ValidationError::new(key, "Index name cannot be empty"));
            } else if name.starts_with('_') || name.chars().any(|c| c.is_ascii_uppercase()) {
                errors.push(ValidationError::new(
                    key,
                    format!("Index name must be lowercase and not start with '_': {}", name),
                ));
            }
        }

        if index.ingredients == index.recipes {
            errors.push(ValidationError::new(
                "index.recipes",
                "Ingredients and recipes need separate indices",
            ));
        }

        if index.shards == 0 {
            errors.push(ValidationError::new(
                "index.shards",
                "Shard count must be greater than 0",
            ));
        }

        if index.ef_search == 0 {
            errors.push(ValidationError::new(
                "index.ef_search",
                "ef_search must be greater than 0",
            ));
        }

        if index.ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.ef_construction",
                "ef_construction must be greater than 0",
            ));
        }

        if index.m == 0 {
            errors.push(ValidationError::new("index.m", "M must be greater than 0"));
        }
    }

    fn validate_upload(config: &Config, errors: &mut Vec<ValidationError>) {
        let upload = &config.upload;

        if upload.batch_size == 0 {
            errors.push(ValidationError::new(
                "upload.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if upload.max_attempts == 0 {
            errors.push(ValidationError::new(
                "upload.max_attempts",
                "At least one attempt is required",
            ));
        }

        Self::check_threshold("upload.success_threshold", upload.success_threshold, errors);
        Self::check_duration("upload.batch_pause", &upload.batch_pause, errors);
        Self::check_duration("upload.initial_backoff", &upload.initial_backoff, errors);
        Self::check_duration("upload.max_backoff", &upload.max_backoff, errors);
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        for (name, profile) in &config.profiles {
            let key = |field: &str| format!("profiles.{}.{}", name, field);

            if let Some(auth) = &profile.auth {
                Self::check_auth(&key("auth"), auth, errors);
            }
            if let Some(threshold) = profile.success_threshold {
                Self::check_threshold(&key("success_threshold"), threshold, errors);
            }
            for (field, value) in [
                ("batch_pause", &profile.batch_pause),
                ("initial_backoff", &profile.initial_backoff),
                ("max_backoff", &profile.max_backoff),
            ] {
                if let Some(value) = value {
                    Self::check_duration(&key(field), value, errors);
                }
            }
        }
    }

    fn check_auth(path: &str, auth: &str, errors: &mut Vec<ValidationError>) {
        if !AUTH_MODES.contains(&auth) {
            errors.push(ValidationError::new(
                path,
                format!("Auth must be one of {:?}, got '{}'", AUTH_MODES, auth),
            ));
        }
    }

    fn check_threshold(path: &str, threshold: f64, errors: &mut Vec<ValidationError>) {
        if !(0.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                path,
                format!("Threshold must be between 0.0 and 1.0, got {}", threshold),
            ));
        }
    }

    fn check_duration(path: &str, value: &str, errors: &mut Vec<ValidationError>) {
        if parse_duration(value).is_none() {
            errors.push(ValidationError::new(
                path,
                format!("Invalid duration format: {}", value),
            ));
        }
    }
}
