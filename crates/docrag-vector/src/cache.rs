//! Model-scoped embedding cache.
//!
//! One file per model, `embeddings_cache_<model>.json`, holding a JSON array
//! of vectors aligned by position with the corpus chunk list. A sidecar
//! `embeddings_cache_<model>.meta.json` records the chunk count, dimension
//! and a fingerprint of the ordered chunk texts so edits that keep the chunk
//! count still invalidate the cache.
//!
//! Regeneration is sequential. Each request is retried with exponential
//! backoff on retryable provider errors; when retries run out the vectors
//! produced so far go to `embeddings_cache_<model>.partial.json` and the next
//! regeneration of the same chunk list resumes from there. The partial file
//! is never served as a cache.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use docrag_core::config::ProviderSettings;
use docrag_core::error::{Error, Result};
use docrag_core::traits::EmbedProvider;
use docrag_core::types::Chunk;

const CACHE_PREFIX: &str = "embeddings_cache_";

/// Cache key for a model identifier: `:` and `/` become `_`.
pub fn cache_key(model: &str) -> String {
    model.replace([':', '/', '\\'], "_")
}

/// blake3 over the ordered chunk texts, length-prefixed so boundaries count.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(&(chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub model: String,
    pub chunk_count: usize,
    pub dimension: usize,
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StagedVectors {
    model: String,
    fingerprint: String,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No cache file for the model.
    Missing,
    /// Cache matches the chunk list and can be served.
    Valid,
    /// Cache exists but was generated for a different chunk list.
    Stale,
}

/// Pacing and retry behaviour for regeneration.
#[derive(Debug, Clone)]
pub struct RegenPolicy {
    pub request_delay: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub show_progress: bool,
}

impl Default for RegenPolicy {
    fn default() -> Self {
        Self::from(&ProviderSettings::default())
    }
}

impl From<&ProviderSettings> for RegenPolicy {
    fn from(s: &ProviderSettings) -> Self {
        Self {
            request_delay: Duration::from_millis(s.request_delay_ms),
            max_retries: s.max_retries,
            backoff: Duration::from_millis(s.backoff_ms),
            show_progress: s.show_progress,
        }
    }
}

pub struct EmbeddingCache {
    dir: PathBuf,
    policy: RegenPolicy,
    verify_fingerprint: bool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EmbeddingCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir, policy: RegenPolicy::default(), verify_fingerprint: true, locks: Mutex::new(HashMap::new()) })
    }

    pub fn with_policy(mut self, policy: RegenPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// When off, only the chunk count decides validity.
    pub fn verify_fingerprint(mut self, on: bool) -> Self {
        self.verify_fingerprint = on;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{}.json", cache_key(model)))
    }

    pub fn manifest_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{}.meta.json", cache_key(model)))
    }

    pub fn staging_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{}.partial.json", cache_key(model)))
    }

    /// Vectors for `chunks` under `model`, positionally aligned.
    ///
    /// Served from the cache when it is valid for this chunk list; otherwise
    /// regenerated through `provider` and persisted. A failed regeneration
    /// returns the error and leaves any previous cache file untouched.
    pub fn get_embeddings<P>(&self, chunks: &[Chunk], model: &str, provider: &P) -> Result<Vec<Vec<f32>>>
    where
        P: EmbedProvider + ?Sized,
    {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let lock = self.lock_for(model);
        let _guard = lock.lock();

        let fp = fingerprint(chunks);
        if let Some(vectors) = self.read_valid(chunks.len(), &fp, model) {
            info!(model, vectors = vectors.len(), "embedding cache hit");
            return Ok(vectors);
        }

        info!(model, chunks = chunks.len(), "regenerating embeddings");
        let vectors = self.regenerate(chunks, model, &fp, provider)?;
        self.persist(model, &fp, &vectors)?;
        Ok(vectors)
    }

    pub fn status(&self, chunks: &[Chunk], model: &str) -> CacheStatus {
        let lock = self.lock_for(model);
        let _guard = lock.lock();
        if !self.cache_path(model).is_file() {
            return CacheStatus::Missing;
        }
        match self.read_valid(chunks.len(), &fingerprint(chunks), model) {
            Some(_) => CacheStatus::Valid,
            None => CacheStatus::Stale,
        }
    }

    /// Remove the cache, its manifest and any staged vectors for `model`.
    /// Returns whether a cache file existed.
    pub fn invalidate(&self, model: &str) -> Result<bool> {
        let lock = self.lock_for(model);
        let _guard = lock.lock();
        let existed = remove_if_present(&self.cache_path(model))?;
        remove_if_present(&self.manifest_path(model))?;
        remove_if_present(&self.staging_path(model))?;
        if existed {
            info!(model, "embedding cache invalidated");
        }
        Ok(existed)
    }

    fn read_valid(&self, chunk_count: usize, fp: &str, model: &str) -> Option<Vec<Vec<f32>>> {
        let path = self.cache_path(model);
        if !path.is_file() {
            debug!(model, "no embedding cache");
            return None;
        }
        let vectors: Vec<Vec<f32>> = match read_json(&path) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unreadable embedding cache, regenerating");
                return None;
            }
        };
        if vectors.len() != chunk_count {
            info!(model, cached = vectors.len(), chunks = chunk_count, "embedding cache count mismatch");
            return None;
        }
        if self.verify_fingerprint {
            let manifest_path = self.manifest_path(model);
            if manifest_path.is_file() {
                match read_json::<CacheManifest>(&manifest_path) {
                    Ok(m) if m.fingerprint == fp => {}
                    Ok(_) => {
                        info!(model, "chunk texts changed since the cache was generated");
                        return None;
                    }
                    Err(e) => {
                        warn!(error = %e, "unreadable cache manifest, regenerating");
                        return None;
                    }
                }
            }
        }
        Some(vectors)
    }

    fn regenerate<P>(&self, chunks: &[Chunk], model: &str, fp: &str, provider: &P) -> Result<Vec<Vec<f32>>>
    where
        P: EmbedProvider + ?Sized,
    {
        let mut vectors = self.load_staged(model, fp, chunks.len());
        if !vectors.is_empty() {
            info!(model, resumed = vectors.len(), total = chunks.len(), "resuming from staged embeddings");
        }

        let pb = self.progress_bar(chunks.len() as u64);
        pb.set_position(vectors.len() as u64);
        let start = vectors.len();
        for (i, chunk) in chunks.iter().enumerate().skip(start) {
            if i > start && !self.policy.request_delay.is_zero() {
                thread::sleep(self.policy.request_delay);
            }
            let embedded = self.embed_with_retry(provider, model, &chunk.text).and_then(|v| {
                match vectors.first() {
                    Some(first) if first.len() != v.len() => Err(Error::Operation(format!(
                        "chunk {i} embedded with dimension {}, expected {}",
                        v.len(),
                        first.len()
                    ))),
                    _ => Ok(v),
                }
            });
            match embedded {
                Ok(v) => {
                    vectors.push(v);
                    pb.inc(1);
                }
                Err(e) => {
                    pb.abandon();
                    warn!(model, chunk = i, error = %e, "embedding regeneration aborted");
                    if let Err(stage_err) = self.stage(model, fp, &vectors) {
                        warn!(error = %stage_err, "could not stage partial embeddings");
                    }
                    return Err(e);
                }
            }
        }
        pb.finish_and_clear();
        Ok(vectors)
    }

    fn embed_with_retry<P>(&self, provider: &P, model: &str, text: &str) -> Result<Vec<f32>>
    where
        P: EmbedProvider + ?Sized,
    {
        let mut attempt: u32 = 0;
        loop {
            match provider.embed(model, text) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let wait = self.policy.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(attempt, max = self.policy.max_retries, wait_ms = wait.as_millis() as u64, error = %e, "retrying embedding request");
                    thread::sleep(wait);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn persist(&self, model: &str, fp: &str, vectors: &[Vec<f32>]) -> Result<()> {
        // Drop the old manifest first so a crash never pairs it with new vectors.
        remove_if_present(&self.manifest_path(model))?;
        write_json_atomic(&self.dir, &self.cache_path(model), vectors)?;
        let manifest = CacheManifest {
            model: model.to_string(),
            chunk_count: vectors.len(),
            dimension: vectors.first().map_or(0, Vec::len),
            fingerprint: fp.to_string(),
            generated_at: Utc::now(),
        };
        write_json_atomic(&self.dir, &self.manifest_path(model), &manifest)?;
        remove_if_present(&self.staging_path(model))?;
        info!(model, vectors = vectors.len(), dimension = manifest.dimension, "embedding cache written");
        Ok(())
    }

    fn stage(&self, model: &str, fp: &str, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        let staged = StagedVectors { model: model.to_string(), fingerprint: fp.to_string(), vectors: vectors.to_vec() };
        write_json_atomic(&self.dir, &self.staging_path(model), &staged)?;
        info!(model, staged = vectors.len(), "staged partial embeddings");
        Ok(())
    }

    fn load_staged(&self, model: &str, fp: &str, chunk_count: usize) -> Vec<Vec<f32>> {
        let path = self.staging_path(model);
        if !path.is_file() {
            return Vec::new();
        }
        match read_json::<StagedVectors>(&path) {
            Ok(s) if s.fingerprint == fp && s.vectors.len() <= chunk_count => s.vectors,
            Ok(_) => {
                debug!(model, "discarding staged embeddings for a different chunk list");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "unreadable staged embeddings, starting over");
                Vec::new()
            }
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.policy.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    fn lock_for(&self, model: &str) -> Arc<Mutex<()>> {
        self.locks.lock().entry(cache_key(model)).or_default().clone()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Corrupt { path: path.to_path_buf(), reason: e.to_string() })
}

fn write_json_atomic<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    serde_json::to_writer(&mut tmp, value)
        .map_err(|e| Error::Operation(format!("serialize {}: {e}", path.display())))?;
    tmp.flush().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}
