use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::database::Database;
use crate::embeddings::EmbeddingClient;
use crate::extractor::HeaderCommentExtractor;
use crate::search::{SearchOptions, VectorSearch};
use crate::seeder::DatabaseSeeder;

const MAX_FAILURES_SHOWN: usize = 10;

/// Walk a script directory and (re)populate the store.
#[inline]
pub async fn seed(directory: Option<PathBuf>, force: bool) -> Result<()> {
    let config = Config::load_default()?;
    let root = directory.unwrap_or_else(|| config.seeding.scripts_dir.clone());

    info!("Seeding script store from {}", root.display());

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let embedder =
        EmbeddingClient::new(&config.provider).context("Failed to create embedding client")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Seeding scripts")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let progress_bar = bar.clone();
    let seeder = DatabaseSeeder::new(
        database,
        embedder,
        HeaderCommentExtractor,
        config.seeding.extensions.clone(),
    )
    .with_batch_size(config.provider.batch_size as usize)
    .with_progress(move |current, total| {
        progress_bar.set_length(total as u64);
        progress_bar.set_position(current as u64);
    });

    if force {
        println!("Resetting script store before seeding.");
        seeder.reset_schema().await?;
    }

    let outcome = seeder.seed_scripts(&root).await?;
    bar.finish_and_clear();

    println!(
        "Seeding completed in {:.1}s",
        outcome.elapsed.as_secs_f64()
    );
    println!("  Scripts processed: {}", outcome.processed);
    println!("  Stored: {}", outcome.inserted);
    println!("  Failed: {}", outcome.failed);
    println!("  Tokens used: {}", outcome.total_tokens);

    if !outcome.category_counts.is_empty() {
        println!("  Categories:");
        for (category, count) in &outcome.category_counts {
            println!("    {category}: {count}");
        }
    }

    if !outcome.failures.is_empty() {
        println!();
        println!("{}", style("Failures:").yellow());
        for failure in outcome.failures.iter().take(MAX_FAILURES_SHOWN) {
            println!("  {}: {}", failure.path.display(), failure.error);
        }
        if outcome.failures.len() > MAX_FAILURES_SHOWN {
            println!(
                "  ... and {} more",
                outcome.failures.len() - MAX_FAILURES_SHOWN
            );
        }
    }

    Ok(())
}

/// Search the store and print ranked results.
#[inline]
pub async fn search(
    query: &str,
    category: Option<String>,
    limit: usize,
    min_similarity: Option<f32>,
) -> Result<()> {
    let config = Config::load_default()?;

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let embedder =
        EmbeddingClient::new(&config.provider).context("Failed to create embedding client")?;

    let vector_search = VectorSearch::new(embedder, database.pool().clone());
    let options = SearchOptions {
        category,
        top_n: limit,
        min_similarity,
    };

    let results = vector_search.search(query, &options).await?;

    if results.is_empty() {
        println!("No matching scripts found.");
        println!("Run 'script-search seed' first if the store is empty.");
        return Ok(());
    }

    println!("Results for {}:", style(query).bold());
    println!();

    for (rank, result) in results.iter().enumerate() {
        let script = &result.script;
        println!(
            "{}. {} {} [{}]",
            rank + 1,
            style(&script.name).bold().cyan(),
            style(format!("({:.3})", result.similarity)).dim(),
            script.category
        );
        if !script.description.is_empty() {
            println!("   {}", script.description);
        }
        if !script.usage.is_empty() {
            println!("   Usage: {}", script.usage);
        }
        println!("   Path: {}", script.path);
        println!();
    }

    Ok(())
}

/// Print aggregate statistics about the script store.
#[inline]
pub async fn show_stats() -> Result<()> {
    let config = Config::load_default()?;

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let embedder =
        EmbeddingClient::new(&config.provider).context("Failed to create embedding client")?;

    let seeder = DatabaseSeeder::new(
        database,
        embedder,
        HeaderCommentExtractor,
        config.seeding.extensions.clone(),
    );
    let stats = seeder.stats().await?;

    println!("Script store: {}", config.database_path().display());
    println!("  Scripts: {}", stats.total_scripts);
    println!("  Categories: {}", stats.total_categories);
    println!("  Average tokens per script: {:.1}", stats.avg_tokens);

    Ok(())
}

/// Print the active configuration with the API key redacted.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let config_dir = get_config_dir()?;

    println!("{}", style("Current Configuration").bold());
    println!();
    println!("Config directory: {}", config_dir.display());
    println!("Database: {}", config.database_path().display());
    println!();
    println!("Provider:");
    println!("  Base URL: {}", config.provider.base_url);
    println!("  Model: {}", config.provider.model);
    match config.provider.dimensions {
        Some(dimensions) => println!("  Dimensions: {dimensions}"),
        None => println!("  Dimensions: (model default)"),
    }
    println!("  Batch size: {}", config.provider.batch_size);
    println!("  API key: {}", redact(&config.provider.api_key));
    println!();
    println!("Seeding:");
    println!("  Scripts directory: {}", config.seeding.scripts_dir.display());
    println!("  Extensions: {}", config.seeding.extensions.join(", "));

    Ok(())
}

fn redact(key: &str) -> String {
    if key.len() <= 8 {
        "*".repeat(key.len())
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_short_keys_entirely() {
        assert_eq!(redact("abc"), "***");
        assert_eq!(redact(""), "");
    }

    #[test]
    fn redact_keeps_only_edges_of_long_keys() {
        let redacted = redact("sk-test-1234567890");
        assert_eq!(redacted, "sk-t...7890");
    }
}
