use tempfile::TempDir;

use super::*;
use crate::database::models::NewScript;
use crate::database::Database;
use crate::embeddings::EmbeddingResult;

/// Embedder that returns the same fixed vector for every input.
struct FakeEmbedder {
    vector: Vec<f32>,
}

impl EmbeddingGenerator for FakeEmbedder {
    fn generate_embedding(&self, text: &str) -> crate::Result<EmbeddingResult> {
        if text.trim().is_empty() {
            return Err(ScriptSearchError::EmptyInput);
        }
        Ok(EmbeddingResult {
            embedding: self.vector.clone(),
            tokens: 1,
            model: "fake".to_string(),
        })
    }

    fn generate_batch(&self, texts: &[String]) -> crate::Result<Vec<EmbeddingResult>> {
        texts
            .iter()
            .map(|text| self.generate_embedding(text))
            .collect()
    }
}

async fn seeded_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let database = Database::new(temp_dir.path().join("test.db"))
        .await
        .expect("can create database");

    let rows = [
        ("audio/fix_audio.sh", "audio", Some(vec![1.0, 0.0, 0.0])),
        ("audio/enable_mic.sh", "audio", Some(vec![0.7, 0.7, 0.0])),
        ("video/configure_obs.sh", "video", Some(vec![0.0, 1.0, 0.0])),
        ("system/cleanup_disk.sh", "system", None),
    ];

    for (path, category, embedding) in rows {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        ScriptQueries::create(
            database.pool(),
            NewScript {
                name,
                path: path.to_string(),
                category: category.to_string(),
                embedding,
                ..NewScript::default()
            },
        )
        .await
        .expect("can create script");
    }

    (database, temp_dir)
}

#[test]
fn cosine_of_identical_vectors_is_one() {
    let v = vec![0.3, -0.5, 0.8];
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_is_symmetric() {
    let a = vec![0.2, 0.9, -0.1];
    let b = vec![-0.4, 0.3, 0.7];
    assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
}

#[test]
fn cosine_of_orthogonal_unit_vectors_is_zero() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    assert!(cosine_similarity(&a, &b).abs() < 1e-6);
}

#[test]
fn cosine_of_opposite_vectors_is_minus_one() {
    let a = vec![0.5, -0.25, 1.0];
    let b: Vec<f32> = a.iter().map(|x| -x).collect();
    assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_with_zero_vector_is_exactly_zero() {
    let a = vec![1.0, 2.0, 3.0];
    let zero = vec![0.0, 0.0, 0.0];
    assert_eq!(cosine_similarity(&a, &zero), 0.0);
    assert_eq!(cosine_similarity(&zero, &a), 0.0);
    assert_eq!(cosine_similarity(&zero, &zero), 0.0);
}

#[test]
fn cosine_with_mismatched_lengths_is_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}

#[tokio::test]
async fn search_ranks_by_similarity() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    let results = search
        .search("restart my audio", &SearchOptions::default())
        .await
        .expect("search succeeds");

    // The unembedded script is excluded, everything else is ranked.
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].script.path, "audio/fix_audio.sh");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);

    // Ranking law: non-increasing similarity.
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn min_similarity_filters_results() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    let results = search
        .search(
            "restart my audio",
            &SearchOptions {
                min_similarity: Some(0.5),
                ..SearchOptions::default()
            },
        )
        .await
        .expect("search succeeds");

    // [1,0,0] scores 1.0 and [0.7,0.7,0] scores ~0.707; [0,1,0] is excluded.
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.similarity >= 0.5));
}

#[tokio::test]
async fn top_n_truncates() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    let results = search
        .search(
            "restart my audio",
            &SearchOptions {
                top_n: 1,
                ..SearchOptions::default()
            },
        )
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].script.path, "audio/fix_audio.sh");
}

#[tokio::test]
async fn category_filter_limits_candidates() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    let results = search
        .search(
            "screen capture",
            &SearchOptions {
                category: Some("video".to_string()),
                ..SearchOptions::default()
            },
        )
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].script.category, "video");
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    assert!(matches!(
        search.search("  ", &SearchOptions::default()).await,
        Err(ScriptSearchError::InvalidQuery)
    ));
}

#[tokio::test]
async fn zero_top_n_is_rejected() {
    let (database, _temp_dir) = seeded_database().await;
    let search = VectorSearch::new(
        FakeEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        },
        database.pool().clone(),
    );

    assert!(matches!(
        search
            .search(
                "anything",
                &SearchOptions {
                    top_n: 0,
                    ..SearchOptions::default()
                }
            )
            .await,
        Err(ScriptSearchError::InvalidTopN)
    ));
}
