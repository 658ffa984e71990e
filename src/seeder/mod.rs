
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::models::NewScript;
use crate::database::{Database, ScriptQueries};
use crate::embeddings::{EmbeddingGenerator, EmbeddingResult};
use crate::extractor::{MetadataExtractor, ScriptMetadata};

/// One file that could not be seeded, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one seeding run.
///
/// `processed` counts every attempted file; `inserted` counts successful
/// upserts; `failed` counts files that errored during extraction,
/// embedding, or storage. A failure never aborts the rest of the run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeedingOutcome {
    pub processed: usize,
    pub inserted: usize,
    pub failed: usize,
    pub failures: Vec<SeedFailure>,
    pub category_counts: BTreeMap<String, usize>,
    pub total_tokens: u64,
    pub elapsed: Duration,
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total_scripts: i64,
    pub total_categories: i64,
    pub avg_tokens: f64,
}

type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Populates the script store from a directory tree: discovery, metadata
/// extraction, batched embedding, upsert keyed on path. Re-running over an
/// unchanged tree replaces rows in place and never duplicates.
pub struct DatabaseSeeder<E, M> {
    database: Database,
    embedder: E,
    extractor: M,
    extensions: Vec<String>,
    batch_size: usize,
    progress: Option<ProgressCallback>,
}

/// A file that survived metadata extraction and is waiting for its
/// embedding.
struct PendingScript {
    path: PathBuf,
    metadata: ScriptMetadata,
    embedding_text: String,
}

impl<E: EmbeddingGenerator, M: MetadataExtractor> DatabaseSeeder<E, M> {
    #[inline]
    pub fn new(database: Database, embedder: E, extractor: M, extensions: Vec<String>) -> Self {
        Self {
            database,
            embedder,
            extractor,
            extensions,
            batch_size: 32,
            progress: None,
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Register a `(current, total)` callback invoked at file boundaries.
    #[inline]
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    #[inline]
    pub async fn initialize_schema(&self) -> Result<()> {
        self.database.initialize_schema().await?;
        Ok(())
    }

    /// Drop and recreate the schema before seeding.
    #[inline]
    pub async fn reset_schema(&self) -> Result<()> {
        self.database.reset_schema().await?;
        Ok(())
    }

    /// Recursively collect script files under `root`. Enumeration order is
    /// whatever the file system yields; callers must not rely on it.
    #[inline]
    pub fn discover_scripts(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut scripts = Vec::new();
        self.walk_directory(root, &mut scripts)?;
        debug!("Discovered {} scripts under {}", scripts.len(), root.display());
        Ok(scripts)
    }

    fn walk_directory(&self, dir: &Path, scripts: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
            let path = entry.path();

            if path.is_dir() {
                self.walk_directory(&path, scripts)?;
            } else if self.is_script(&path) {
                scripts.push(path);
            }
        }

        Ok(())
    }

    fn is_script(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    /// Seed the store from every script under `root`.
    #[inline]
    pub async fn seed_scripts(&self, root: &Path) -> Result<SeedingOutcome> {
        let started = Instant::now();
        let mut outcome = SeedingOutcome::default();

        let scripts = self.discover_scripts(root)?;
        let total = scripts.len();
        info!("Seeding {} scripts from {}", total, root.display());

        let mut pending = Vec::new();

        for path in scripts {
            match self.extractor.extract(&path) {
                Ok(metadata) => {
                    let embedding_text = build_embedding_text(&metadata, &path);
                    pending.push(PendingScript {
                        path,
                        metadata,
                        embedding_text,
                    });
                }
                Err(error) => {
                    warn!("Failed to extract metadata from {}: {}", path.display(), error);
                    outcome.processed += 1;
                    outcome.failed += 1;
                    outcome.failures.push(SeedFailure {
                        path,
                        error: error.to_string(),
                    });
                    self.report_progress(outcome.processed, total);
                }
            }
        }

        for batch in pending.chunks(self.batch_size) {
            self.seed_batch(batch, &mut outcome, total).await;
        }

        outcome.elapsed = started.elapsed();
        info!(
            "Seeding finished: {} processed, {} inserted, {} failed in {:.1?}",
            outcome.processed, outcome.inserted, outcome.failed, outcome.elapsed
        );

        Ok(outcome)
    }

    async fn seed_batch(&self, batch: &[PendingScript], outcome: &mut SeedingOutcome, total: usize) {
        let texts: Vec<String> = batch
            .iter()
            .map(|item| item.embedding_text.clone())
            .collect();

        match self.embedder.generate_batch(&texts) {
            Ok(results) => {
                for (item, result) in batch.iter().zip(results) {
                    self.store_script(item, result, outcome, total).await;
                }
            }
            Err(batch_error) => {
                // A whole-batch failure is not attributed to every file in
                // it; each text is retried on its own so only genuinely
                // failing inputs are reported.
                warn!(
                    "Batch of {} embeddings failed ({}), retrying individually",
                    batch.len(),
                    batch_error
                );

                for item in batch {
                    match self.embedder.generate_embedding(&item.embedding_text) {
                        Ok(result) => {
                            self.store_script(item, result, outcome, total).await;
                        }
                        Err(error) => {
                            outcome.processed += 1;
                            outcome.failed += 1;
                            outcome.failures.push(SeedFailure {
                                path: item.path.clone(),
                                error: error.to_string(),
                            });
                            self.report_progress(outcome.processed, total);
                        }
                    }
                }
            }
        }
    }

    async fn store_script(
        &self,
        item: &PendingScript,
        embedding: EmbeddingResult,
        outcome: &mut SeedingOutcome,
        total: usize,
    ) {
        outcome.processed += 1;

        let new_script = NewScript {
            name: item.metadata.name.clone(),
            path: item.path.to_string_lossy().into_owned(),
            category: item.metadata.category.clone(),
            description: item.metadata.description.clone(),
            usage: item.metadata.usage.clone(),
            tags: item.metadata.tags.clone(),
            dependencies: item.metadata.dependencies.clone(),
            embedding_text: item.embedding_text.clone(),
            embedding: Some(embedding.embedding),
            tokens: i64::from(embedding.tokens),
        };

        match ScriptQueries::upsert(self.database.pool(), new_script).await {
            Ok(record) => {
                outcome.inserted += 1;
                outcome.total_tokens += u64::try_from(record.tokens).unwrap_or(0);
                *outcome
                    .category_counts
                    .entry(record.category)
                    .or_insert(0) += 1;
            }
            Err(error) => {
                warn!("Failed to store {}: {}", item.path.display(), error);
                outcome.failed += 1;
                outcome.failures.push(SeedFailure {
                    path: item.path.clone(),
                    error: error.to_string(),
                });
            }
        }

        self.report_progress(outcome.processed, total);
    }

    fn report_progress(&self, current: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(current.min(total), total);
        }
    }

    /// Aggregate statistics straight from the store.
    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let row: (i64, i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT category), COALESCE(AVG(tokens), 0.0) FROM scripts",
        )
        .fetch_one(self.database.pool())
        .await?;

        Ok(StoreStats {
            total_scripts: row.0,
            total_categories: row.1,
            avg_tokens: row.2,
        })
    }
}

/// Text submitted to the embedding provider for one script: description
/// first, then usage, tags, and dependencies for extra signal. Falls back
/// to the file name when a script has no description at all.
fn build_embedding_text(metadata: &ScriptMetadata, path: &Path) -> String {
    let mut parts = Vec::new();

    if metadata.description.is_empty() {
        let fallback = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| metadata.name.clone());
        parts.push(fallback);
    } else {
        parts.push(metadata.description.clone());
    }

    if !metadata.usage.is_empty() {
        parts.push(format!("Usage: {}", metadata.usage));
    }
    if !metadata.tags.is_empty() {
        parts.push(format!("Tags: {}", metadata.tags.join(", ")));
    }
    if !metadata.dependencies.is_empty() {
        parts.push(format!("Uses: {}", metadata.dependencies.join(", ")));
    }

    parts.join("\n")
}
