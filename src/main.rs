use std::path::PathBuf;

use clap::{Parser, Subcommand};
use script_search::commands::{search, seed, show_config, show_stats};

#[derive(Parser)]
#[command(name = "script-search")]
#[command(about = "Semantic search over a catalog of system-configuration scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index script files into the store
    Seed {
        /// Directory to scan for scripts (defaults to the configured one)
        #[arg(long)]
        directory: Option<PathBuf>,
        /// Drop and rebuild the store before seeding
        #[arg(long)]
        force: bool,
    },
    /// Search scripts by natural-language description
    Search {
        /// What you want the script to do, e.g. "fix crackling audio"
        query: String,
        /// Only consider scripts in this category
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Drop results scoring below this similarity (between -1 and 1)
        #[arg(long)]
        min_similarity: Option<f32>,
    },
    /// Show statistics about the script store
    Stats,
    /// Show the active configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Seed { directory, force } => seed(directory, force).await,
        Commands::Search {
            query,
            category,
            limit,
            min_similarity,
        } => search(&query, category, limit, min_similarity).await,
        Commands::Stats => show_stats().await,
        Commands::Config => show_config(),
    };

    if let Err(error) = result {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
