#[cfg(test)]
mod tests;

use tracing::debug;

use crate::database::models::ListOptions;
use crate::database::{DbPool, ScriptQueries, ScriptRecord};
use crate::embeddings::EmbeddingGenerator;
use crate::{Result, ScriptSearchError};

/// A ranked hit: the stored script and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub script: ScriptRecord,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub category: Option<String>,
    pub top_n: usize,
    pub min_similarity: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            category: None,
            top_n: 10,
            min_similarity: None,
        }
    }
}

/// Brute-force similarity search over the script store.
///
/// Every query embeds the query text and re-scans the (optionally
/// category-filtered) candidate set, O(n·d) per call. Fine for a catalog of
/// hundreds of scripts; beyond low thousands an index would be needed.
pub struct VectorSearch<E> {
    embedder: E,
    pool: DbPool,
}

impl<E: EmbeddingGenerator> VectorSearch<E> {
    #[inline]
    pub fn new(embedder: E, pool: DbPool) -> Self {
        Self { embedder, pool }
    }

    /// Rank stored scripts by semantic similarity to `query`.
    ///
    /// Results come back sorted by descending similarity (ties keep store
    /// order), truncated to `top_n`, with scores below `min_similarity`
    /// dropped when one is supplied. Scripts without an embedding are
    /// never returned.
    #[inline]
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ScriptSearchError::InvalidQuery);
        }
        if options.top_n == 0 {
            return Err(ScriptSearchError::InvalidTopN);
        }

        let query_embedding = self.embedder.generate_embedding(query)?.embedding;

        let candidates = ScriptQueries::list(
            &self.pool,
            &ListOptions {
                category: options.category.clone(),
                limit: None,
                offset: 0,
            },
        )
        .await?;

        debug!(
            "Scoring {} candidates for query (length: {})",
            candidates.len(),
            query.len()
        );

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|script| {
                let embedding = script.embedding.as_deref().filter(|e| !e.is_empty())?;
                let similarity = cosine_similarity(&query_embedding, embedding);
                Some(SearchResult { script, similarity })
            })
            .filter(|result| {
                options
                    .min_similarity
                    .is_none_or(|floor| result.similarity >= floor)
            })
            .collect();

        // Stable sort: equal scores keep the store's deterministic order.
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(options.top_n);

        Ok(results)
    }
}

/// Cosine similarity of two vectors, in [-1, 1].
///
/// A zero-magnitude vector on either side (and a length mismatch) yields
/// 0.0 rather than NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b.iter())
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, norm_a, norm_b), (x, y)| {
            (dot + x * y, norm_a + x * x, norm_b + y * y)
        });

    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
