mod common;

use std::time::Duration;
use tempfile::TempDir;

use common::{chunks, MockProvider};
use docrag_core::error::{Error, Result};
use docrag_core::traits::EmbedProvider;
use docrag_embed::FakeEmbedder;
use docrag_vector::{cosine_similarity, rank, semantic_search, EmbeddingCache, RegenPolicy};

/// Returns the same vector for every prompt.
struct Fixed(Vec<f32>);

impl EmbedProvider for Fixed {
    fn embed(&self, _model: &str, _prompt: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

#[test]
fn cosine_is_bounded() {
    let a = [1.0, 2.0, 3.0];
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    assert!((cosine_similarity(&a, &[-1.0, -2.0, -3.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);

    let pairs = [([3.0e30f32, 1.0], [3.0e30f32, 1.0]), ([1e-30, 2e-30], [-5.0, 7.0])];
    for (x, y) in pairs {
        let s = cosine_similarity(&x, &y);
        assert!((-1.0..=1.0).contains(&s), "{s} out of range");
    }
}

#[test]
fn ranking_is_stable_for_ties() {
    let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0], vec![0.0, 3.0]];
    let ranked = rank(&[0.0, 1.0], &vectors, 3);
    let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 2, 4]);
    assert!(rank(&[0.0, 1.0], &vectors, 0).is_empty());
}

#[test]
fn single_chunk_matching_query_scores_one() {
    let corpus = chunks(&["the only chunk"]);
    let provider = Fixed(vec![0.3, -0.2, 0.9]);
    let results = semantic_search("q", &corpus, &[vec![0.3, -0.2, 0.9]], "m", 1, &provider).expect("search");
    assert_eq!(results.len(), 1);
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert_eq!(results[0].text, "the only chunk");
    assert_eq!(results[0].metadata.chunk_index, 0);
}

#[test]
fn misaligned_vectors_are_rejected() {
    let corpus = chunks(&["a", "b"]);
    let err = semantic_search("q", &corpus, &[vec![1.0]], "m", 1, &Fixed(vec![1.0])).expect_err("misaligned");
    assert!(matches!(err, Error::Operation(_)));
}

#[test]
fn query_embedding_failure_fails_the_search() {
    let corpus = chunks(&["a"]);
    let provider = MockProvider::failing_on("boom query");
    let result = semantic_search("boom query", &corpus, &[vec![1.0, 1.0, 1.0]], "m", 1, &provider);
    assert!(matches!(result, Err(Error::ProviderStatus { status: 500, .. })));
}

#[test]
fn fake_embeddings_rank_the_relevant_chunk_first() {
    let tmp = TempDir::new().unwrap();
    let cache = EmbeddingCache::open(tmp.path()).unwrap().with_policy(RegenPolicy {
        request_delay: Duration::ZERO,
        max_retries: 0,
        backoff: Duration::ZERO,
        show_progress: false,
    });
    let provider = FakeEmbedder::new(256);
    let corpus = chunks(&[
        "Bake the bread at a high heat until golden.",
        "Configure the network adapter before the first boot.",
        "Water the garden in the early morning.",
    ]);
    let vectors = cache.get_embeddings(&corpus, "fake", &provider).unwrap();
    let results = semantic_search("network adapter setup", &corpus, &vectors, "fake", 2, &provider).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].text.contains("network adapter"));
    assert!(results[0].score >= results[1].score);
}
