use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kbsearch_core::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "kbsearch",
    version,
    about = "Knowledge-base retrieval: index Markdown docs into Qdrant and search them",
    long_about = "Knowledge-base retrieval over a Qdrant collection.\n\n\
                  Settings come from config.toml, config.<RUST_ENV>.toml, APP_* variables\n\
                  and the QDRANT_URL / LIMIT_FIRST / RERANK_ALPHA style variables.\n\n\
                  Examples:\n  \
                    kbsearch index docs_crawl            Chunk, embed and upsert the crawl\n  \
                    kbsearch search 'как сменить ключ'  Ranked passages for a query\n  \
                    kbsearch relevance                   Check the relevance fixture"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search the knowledge base and print ranked passages
    Search {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Candidates requested from the vector store
        #[arg(long)]
        limit_first: Option<usize>,

        /// Results kept after reranking
        #[arg(long)]
        limit_final: Option<usize>,

        /// Weight of the vector score in the lexical blend, within [0, 1]
        #[arg(long)]
        alpha: Option<f32>,

        /// Rerank with the cross-encoder (falls back to the lexical blend if it cannot load)
        #[arg(long)]
        cross_encoder: bool,
    },
    /// Chunk Markdown pages, embed them and upsert into the collection
    Index {
        /// Crawled docs directory (default: indexing.docs_dir)
        docs_dir: Option<PathBuf>,

        /// Drop the collection before indexing
        #[arg(long)]
        recreate: bool,
    },
    /// Dump the collection to a JSONL file
    Export {
        /// Output file (default: indexing.export_file)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the collection with the points of a JSONL export
    Restore {
        /// Export file (default: indexing.export_file)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the payloads of the first points in the collection
    Inspect {
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Run the relevance fixture; exits 1 if any case fails
    Relevance {
        #[arg(long, default_value = "fixtures/relevance_tests.json")]
        fixture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "warn,kbsearch=debug" } else { "warn,kbsearch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Config::load()?.settings()?;
    let base_dir = std::env::current_dir()?;

    match cli.command {
        Command::Search { query, limit_first, limit_final, alpha, cross_encoder } => {
            let overrides = commands::SearchOverrides { limit_first, limit_final, alpha, cross_encoder };
            commands::search(&settings, &base_dir, &query.join(" "), overrides).await?;
        }
        Command::Index { docs_dir, recreate } => commands::index(&settings, &base_dir, docs_dir, recreate).await?,
        Command::Export { out } => commands::export(&settings, &base_dir, out).await?,
        Command::Restore { input } => commands::restore(&settings, &base_dir, input).await?,
        Command::Inspect { limit } => commands::inspect(&settings, limit).await?,
        Command::Relevance { fixture } => return commands::relevance(&settings, &base_dir, &fixture).await,
    }
    Ok(ExitCode::SUCCESS)
}
