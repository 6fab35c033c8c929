mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

use common::{chunks, MockProvider};
use docrag_core::error::Error;
use docrag_vector::{CacheManifest, CacheStatus, EmbeddingCache, RegenPolicy};

const MODEL: &str = "granite3.2:8b-instruct-fp16";

fn quiet_policy(max_retries: u32) -> RegenPolicy {
    RegenPolicy { request_delay: Duration::ZERO, max_retries, backoff: Duration::from_millis(1), show_progress: false }
}

fn cache(tmp: &TempDir) -> EmbeddingCache {
    EmbeddingCache::open(tmp.path()).expect("cache").with_policy(quiet_policy(3))
}

#[test]
fn second_call_is_served_from_cache() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    let corpus = chunks(&["alpha", "beta gamma", "delta"]);

    let first = cache.get_embeddings(&corpus, MODEL, &provider).expect("generate");
    assert_eq!(first.len(), corpus.len());
    assert_eq!(provider.calls(), 3);
    assert!(tmp.path().join("embeddings_cache_granite3.2_8b-instruct-fp16.json").is_file());

    let second = cache.get_embeddings(&corpus, MODEL, &provider).expect("cached");
    assert_eq!(second, first);
    assert_eq!(provider.calls(), 3, "no provider calls for an unchanged chunk list");

    let on_disk: Vec<Vec<f32>> = serde_json::from_slice(&fs::read(cache.cache_path(MODEL)).unwrap()).unwrap();
    assert_eq!(on_disk, first);
    let manifest: CacheManifest = serde_json::from_slice(&fs::read(cache.manifest_path(MODEL)).unwrap()).unwrap();
    assert_eq!(manifest.chunk_count, 3);
    assert_eq!(manifest.dimension, 3);
}

#[test]
fn count_change_regenerates_everything() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    cache.get_embeddings(&chunks(&["a", "b"]), MODEL, &provider).unwrap();
    let grown = chunks(&["a", "b", "c"]);
    assert_eq!(cache.status(&grown, MODEL), CacheStatus::Stale);
    assert_eq!(cache.get_embeddings(&grown, MODEL, &provider).unwrap().len(), 3);
    assert_eq!(provider.calls(), 5);
}

#[test]
fn edited_text_with_same_count_is_detected() {
    let tmp = TempDir::new().unwrap();
    let provider = MockProvider::default();
    cache(&tmp).get_embeddings(&chunks(&["one", "two"]), MODEL, &provider).unwrap();
    let edited = chunks(&["one", "two, revised"]);

    let count_only = cache(&tmp).verify_fingerprint(false);
    assert_eq!(count_only.status(&edited, MODEL), CacheStatus::Valid);

    let strict = cache(&tmp);
    assert_eq!(strict.status(&edited, MODEL), CacheStatus::Stale);
    let vectors = strict.get_embeddings(&edited, MODEL, &provider).unwrap();
    assert_eq!(vectors[1][0], "two, revised".len() as f32);
    assert_eq!(provider.calls(), 4);
}

#[test]
fn cache_without_manifest_is_validated_by_count() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    fs::write(cache.cache_path(MODEL), "[[1.0,0.0],[0.0,1.0]]").unwrap();
    let provider = MockProvider::default();
    let vectors = cache.get_embeddings(&chunks(&["x", "y"]), MODEL, &provider).unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn corrupt_cache_is_regenerated() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    fs::write(cache.cache_path(MODEL), "[[1.0,").unwrap();
    let provider = MockProvider::default();
    assert_eq!(cache.get_embeddings(&chunks(&["x"]), MODEL, &provider).unwrap().len(), 1);
    assert_eq!(provider.calls(), 1);
}

#[test]
fn failed_regeneration_persists_nothing_and_resumes() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp).with_policy(quiet_policy(1));
    let corpus = chunks(&["c0", "c1", "c2 breaks", "c3"]);
    let provider = MockProvider::failing_on("c2 breaks");

    let err = cache.get_embeddings(&corpus, MODEL, &provider).expect_err("aborted");
    assert!(matches!(err, Error::ProviderStatus { status: 500, .. }));
    assert_eq!(provider.calls(), 4, "two successes, one request plus one retry");
    assert!(!cache.cache_path(MODEL).exists(), "no partial cache is served");
    assert!(cache.staging_path(MODEL).is_file());
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Missing);

    *provider.fail_on.lock() = None;
    let vectors = cache.get_embeddings(&corpus, MODEL, &provider).expect("resumed");
    assert_eq!(vectors.len(), 4);
    assert_eq!(provider.calls(), 6, "only the remaining chunks are requested");
    assert_eq!(vectors[0][0], 2.0);
    assert!(!cache.staging_path(MODEL).exists());
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Valid);
}

#[test]
fn staged_vectors_for_another_chunk_list_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp).with_policy(quiet_policy(0));
    let provider = MockProvider::failing_on("b");
    assert!(cache.get_embeddings(&chunks(&["a", "b"]), MODEL, &provider).is_err());
    assert_eq!(provider.calls(), 2);

    *provider.fail_on.lock() = None;
    cache.get_embeddings(&chunks(&["z", "b"]), MODEL, &provider).unwrap();
    assert_eq!(provider.calls(), 4);
}

#[test]
fn transient_failures_are_retried() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    provider.transient.store(2, Ordering::SeqCst);
    let vectors = cache.get_embeddings(&chunks(&["a", "b"]), MODEL, &provider).expect("retried");
    assert_eq!(vectors.len(), 2);
    assert_eq!(provider.calls(), 4);
}

#[test]
fn retries_are_bounded() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp).with_policy(quiet_policy(2));
    let provider = MockProvider::default();
    provider.transient.store(10, Ordering::SeqCst);
    assert!(cache.get_embeddings(&chunks(&["a"]), MODEL, &provider).is_err());
    assert_eq!(provider.calls(), 3);
}

#[test]
fn client_errors_are_not_retried() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::failing_on("a");
    *provider.fail_status.lock() = Some(404);
    assert!(cache.get_embeddings(&chunks(&["a"]), MODEL, &provider).is_err());
    assert_eq!(provider.calls(), 1);
}

#[test]
fn malformed_responses_are_not_retried() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    provider.malformed.store(true, Ordering::SeqCst);
    let err = cache.get_embeddings(&chunks(&["a", "b"]), MODEL, &provider).expect_err("malformed");
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(provider.calls(), 1);
}

#[test]
fn invalidate_removes_the_cache() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    let corpus = chunks(&["a"]);
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Missing);
    cache.get_embeddings(&corpus, MODEL, &provider).unwrap();
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Valid);
    assert!(cache.invalidate(MODEL).unwrap());
    assert!(!cache.invalidate(MODEL).unwrap());
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Missing);
}

#[test]
fn models_have_separate_caches() {
    let tmp = TempDir::new().unwrap();
    let cache = cache(&tmp);
    let provider = MockProvider::default();
    let corpus = chunks(&["a"]);
    cache.get_embeddings(&corpus, "nomic-embed-text", &provider).unwrap();
    assert_eq!(cache.status(&corpus, MODEL), CacheStatus::Missing);
    assert!(tmp.path().join("embeddings_cache_nomic-embed-text.json").is_file());
}

#[test]
fn empty_corpus_needs_no_requests() {
    let tmp = TempDir::new().unwrap();
    let provider = MockProvider::default();
    assert!(cache(&tmp).get_embeddings(&[], MODEL, &provider).unwrap().is_empty());
    assert_eq!(provider.calls(), 0);
}
