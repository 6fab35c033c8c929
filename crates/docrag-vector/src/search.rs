//! Brute-force cosine ranking over cached chunk vectors.

use tracing::warn;

use docrag_core::error::{Error, Result};
use docrag_core::traits::EmbedProvider;
use docrag_core::types::{Chunk, SearchResult};

/// Cosine similarity in `[-1, 1]`.
///
/// Zero-norm vectors and vectors of different lengths score `0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let sim = dot / (na.sqrt() * nb.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// `(position, score)` of the `top_k` most similar vectors.
///
/// Ties keep ascending position.
pub fn rank(query: &[f32], vectors: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> =
        vectors.iter().enumerate().map(|(i, v)| (i, cosine_similarity(query, v))).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

/// Embed `query` with `model` and rank `chunks` by their aligned `vectors`.
///
/// Results carry the raw chunk text. Fails if the query cannot be embedded
/// or if `vectors` is not aligned with `chunks`.
pub fn semantic_search<P>(
    query: &str,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    model: &str,
    top_k: usize,
    provider: &P,
) -> Result<Vec<SearchResult>>
where
    P: EmbedProvider + ?Sized,
{
    if vectors.len() != chunks.len() {
        return Err(Error::Operation(format!(
            "{} vectors for {} chunks; regenerate the embedding cache",
            vectors.len(),
            chunks.len()
        )));
    }
    if top_k == 0 || chunks.is_empty() {
        return Ok(Vec::new());
    }
    let query_vec = provider.embed(model, query)?;
    if let Some(first) = vectors.first() {
        if first.len() != query_vec.len() {
            warn!(query_dim = query_vec.len(), cache_dim = first.len(), "query and cache dimensions differ");
        }
    }
    Ok(rank(&query_vec, vectors, top_k)
        .into_iter()
        .map(|(i, score)| SearchResult { text: chunks[i].text.clone(), score, metadata: chunks[i].metadata.clone() })
        .collect())
}
