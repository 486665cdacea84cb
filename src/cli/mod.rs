//! CLI command definitions and parsing
use crate::records::RecordKind;
use crate::search::EnsureMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "recipe-indexer",
    version,
    author = "neur0map",
    about = "Embed ingredient and recipe records and load them into a hybrid search index",
    long_about = "recipe-indexer turns exported ingredient and recipe records into vector \
                  embeddings with a hosted embedding model, stores them in an intermediate \
                  file, and bulk loads them into an OpenSearch-compatible cluster with a \
                  Korean lexical analyzer and a kNN vector field."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/recipe-indexer/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "local", "managed")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which record kinds a command works on
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Ingredients,
    Recipes,
    All,
}

impl KindArg {
    pub fn kinds(self) -> Vec<RecordKind> {
        match self {
            KindArg::Ingredients => vec![RecordKind::Ingredient],
            KindArg::Recipes => vec![RecordKind::Recipe],
            KindArg::All => RecordKind::ALL.to_vec(),
        }
    }
}

/// How existing indices are treated
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Delete and recreate
    Destructive,
    /// Keep an existing index and upsert into it
    Additive,
}

impl From<ModeArg> for EnsureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Destructive => EnsureMode::Destructive,
            ModeArg::Additive => EnsureMode::Additive,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate embeddings and write the embedding files
    Embed {
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,
    },

    /// Load embedding files into the search cluster
    Load {
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,

        /// Index handling (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Skip post-load verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Embed, then load
    Run {
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,

        /// Index handling (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Check indices that were already loaded
    Verify {
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,
    },

    /// Print the index creation body
    Schema {
        #[arg(short, long, value_enum)]
        kind: KindArg,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
