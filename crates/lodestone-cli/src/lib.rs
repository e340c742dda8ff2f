//! Command-line host for the lodestone retrieval engine.
//!
//! Three subcommands, mirroring the engine's three operations:
//! `index`, `search` and `stats`. Output is JSON so the commands
//! compose with other tooling.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lodestone_index::{Domain, EngineConfig, RetrievalEngine, SearchOptions};

#[derive(Parser)]
#[command(name = "lodestone", version, about = "Project indexing and semantic retrieval")]
struct Cli {
    /// Project root to index and search
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Project name, used to namespace collections
    #[arg(long, default_value = "lodestone", global = true)]
    project: String,

    /// Qdrant server URL
    #[arg(long, env = "LODESTONE_QDRANT_URL", global = true)]
    qdrant_url: Option<String>,

    /// Embedding API key
    #[arg(long, env = "LODESTONE_EMBEDDING_API_KEY", global = true, hide_env_values = true)]
    embedding_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild all collections from the current file tree
    Index,

    /// Search the indexed collections
    Search {
        /// The query text
        query: String,

        /// Domains to search (code, docs, skills); defaults to all
        #[arg(long, value_delimiter = ',')]
        domains: Vec<Domain>,

        /// Maximum number of results
        #[arg(long, default_value_t = lodestone_index::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Show index statistics
    Stats,
}

/// Run the CLI.
pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::for_project(&cli.root, cli.project.clone());
    if let Some(url) = cli.qdrant_url {
        config = config.with_qdrant_url(url);
    }
    config.embedding_api_key = cli.embedding_api_key;

    let engine = RetrievalEngine::connect(config).await?;

    match cli.command {
        Command::Index => {
            let stats = engine.index().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Search { query, domains, limit } => {
            let options = SearchOptions::default()
                .with_domains(if domains.is_empty() {
                    Domain::ALL.to_vec()
                } else {
                    domains
                })
                .with_limit(limit);

            let results = engine.search(&query, options).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
