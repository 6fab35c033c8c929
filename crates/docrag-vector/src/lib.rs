//! docrag-vector
//!
//! Embedding cache keyed by model plus cosine similarity search over the
//! cached vectors. No index structure: every query scans all vectors.
pub mod cache;
pub mod search;

pub use cache::{cache_key, fingerprint, CacheManifest, CacheStatus, EmbeddingCache, RegenPolicy};
pub use search::{cosine_similarity, rank, semantic_search};
