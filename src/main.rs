use recipe_indexer::cli::{Cli, Commands, ConfigAction, KindArg, ModeArg};
use recipe_indexer::config::Config;
use recipe_indexer::embedding::{EmbeddingClient, OpenAiEmbeddingService};
use recipe_indexer::error::{IndexerError, Result};
use recipe_indexer::loader::VerificationReport;
use recipe_indexer::pipeline::{self, LoadOptions, LoadSummary};
use recipe_indexer::search::{EnsureMode, OpenSearchClient};
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the run completed but did not meet its threshold
fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config;
    let profile = cli.profile;

    match cli.command {
        Commands::Embed { kind } => {
            let config = load_config(config_path, profile)?;
            runtime()?.block_on(cmd_embed(&config, kind))?;
            Ok(true)
        }
        Commands::Load {
            kind,
            mode,
            no_verify,
        } => {
            let config = load_config(config_path, profile)?;
            let options = LoadOptions {
                mode: resolve_mode(&config, mode),
                verify: !no_verify,
            };
            runtime()?.block_on(cmd_load(&config, kind, options))
        }
        Commands::Run { kind, mode } => {
            let config = load_config(config_path, profile)?;
            let options = LoadOptions {
                mode: resolve_mode(&config, mode),
                verify: true,
            };
            runtime()?.block_on(async {
                cmd_embed(&config, kind).await?;
                cmd_load(&config, kind, options).await
            })
        }
        Commands::Verify { kind } => {
            let config = load_config(config_path, profile)?;
            runtime()?.block_on(cmd_verify(&config, kind))
        }
        Commands::Schema { kind } => {
            let config = load_config(config_path, profile)?;
            cmd_schema(&config, kind)?;
            Ok(true)
        }
        Commands::Config { action } => {
            cmd_config(config_path, profile, action)?;
            Ok(true)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "recipe_indexer=debug"
    } else {
        "recipe_indexer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| IndexerError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn resolve_mode(config: &Config, mode: Option<ModeArg>) -> EnsureMode {
    mode.map(EnsureMode::from).unwrap_or(config.upload.mode)
}

fn search_client(config: &Config) -> Result<OpenSearchClient> {
    let client = OpenSearchClient::new(config.transport()?, config.auth_mode()?)?;
    Ok(client)
}

async fn cmd_embed(config: &Config, kind: KindArg) -> Result<()> {
    let service = OpenAiEmbeddingService::new(
        &config.api_key()?,
        &config.embedding.base_url,
        &config.embedding.model,
        config.embedding_timeout()?,
    )?;
    let client = EmbeddingClient::new(
        Arc::new(service),
        config.request_delay()?,
        config.embedding_retry()?,
        config.embedding.dimension,
    );

    for kind in kind.kinds() {
        let report = pipeline::embed_kind(config, &client, kind).await?;

        println!("✓ Embedded {}: {}/{}", kind, report.embedded, report.total);
        println!("  Output: {}", config.embeddings_path(kind).display());
        if !report.dropped.is_empty() {
            println!("  Dropped: {}", report.dropped.len());
            for dropped in report.dropped.iter().take(10) {
                println!("    - {} ({}): {}", dropped.name, dropped.id, dropped.error);
            }
        }
    }

    Ok(())
}

async fn cmd_load(config: &Config, kind: KindArg, options: LoadOptions) -> Result<bool> {
    let client = search_client(config)?;
    let summary = pipeline::load(&client, config, &kind.kinds(), options).await?;
    print_summary(&summary);
    Ok(summary.passed())
}

async fn cmd_verify(config: &Config, kind: KindArg) -> Result<bool> {
    let client = search_client(config)?;
    let names: Vec<String> = kind
        .kinds()
        .into_iter()
        .map(|k| config.index_name(k).to_string())
        .collect();
    let indices: Vec<&str> = names.iter().map(String::as_str).collect();

    let report = pipeline::verify(&client, config, &indices).await;
    print_verification(&report);
    Ok(report.is_healthy())
}

fn cmd_schema(config: &Config, kind: KindArg) -> Result<()> {
    for kind in kind.kinds() {
        let descriptor = config.descriptor(kind);
        let body = serde_json::to_string_pretty(&descriptor.to_create_body()).map_err(|e| {
            IndexerError::Json {
                source: e,
                context: "Failed to serialize index body".to_string(),
            }
        })?;
        println!("PUT /{}", descriptor.name);
        println!("{}", body);
    }
    Ok(())
}

fn print_summary(summary: &LoadSummary) {
    println!("\nUpload Summary");
    println!("==============");

    for load in &summary.loads {
        let upload = &load.upload;
        let status = if upload.meets_threshold(summary.success_threshold) {
            "✓"
        } else {
            "✗"
        };
        println!(
            "{} {}: {}/{} uploaded ({:.1}%), {} errors, {} rejected before upload",
            status,
            load.index,
            upload.success_count,
            load.submitted,
            upload.success_ratio() * 100.0,
            upload.error_count,
            load.rejected()
        );
        for sample in &upload.error_samples {
            println!("    - {}", sample);
        }
    }

    for kind in &summary.skipped {
        println!("⚠ {}: embedding file not found, skipped", kind);
    }

    if let Some(report) = &summary.verification {
        print_verification(report);
    }

    if !summary.passed() {
        println!(
            "\n✗ Success ratio below threshold ({:.0}%)",
            summary.success_threshold * 100.0
        );
    }
}

fn print_verification(report: &VerificationReport) {
    println!("\nVerification");
    println!("============");
    if let Some(health) = report.cluster_health {
        println!("Cluster health: {}", health);
    }
    for index in &report.indices {
        let mark = if index.is_healthy() { "✓" } else { "⚠" };
        println!(
            "{} {}: {} documents",
            mark,
            index.index,
            index
                .document_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        if let Some(name) = &index.sample_name {
            println!(
                "  Sample: {} ({} dims)",
                name,
                index.sample_dimension.unwrap_or(0)
            );
        }
        if let Some(hits) = index.similarity_hits {
            println!("  Similarity search: {} results", hits);
        }
        if let Some(hits) = index.lexical_hits {
            println!("  Keyword search: {} results", hits);
        }
        for problem in &index.problems {
            println!("  ⚠ {}", problem);
        }
    }
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| IndexerError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match &section {
                Some(section) => value.get(section).cloned().ok_or_else(|| {
                    IndexerError::Config(format!("Unknown config section: {}", section))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| IndexerError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match &profile {
                Some(profile) => Config::load_with_profile(&path, profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Cluster: {}:{} (auth: {})",
                config.cluster.host, config.cluster.port, config.cluster.auth
            );
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| IndexerError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Profiles: local, managed (select with --profile)");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'recipe-indexer config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        recipe_indexer::config::ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
