//! File-backed chunk store: one pretty-printed JSON array per source.
//!
//! Chunk files are named `<sanitized source>_chunks.json`. A chunk list is
//! always replaced wholesale; writes go through a temp file in the same
//! directory and are renamed into place, so readers never observe a partial
//! file. `corpus.json` records the chunking profile the corpus was built with.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chunker::BoundaryPolicy;
use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::Chunk;

const CHUNK_FILE_SUFFIX: &str = "_chunks.json";
const MANIFEST_FILE: &str = "corpus.json";

/// Replace every character that is not alphanumeric, `_`, `-` or `.` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect()
}

/// Chunking profile a corpus was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub boundary: BoundaryPolicy,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl From<ChunkingSettings> for CorpusManifest {
    fn from(s: ChunkingSettings) -> Self {
        Self { boundary: s.boundary, chunk_size: s.chunk_size, overlap: s.overlap }
    }
}

/// A chunk file that could not be loaded during an aggregate load.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of [`ChunkStore::load_all`]: every readable chunk plus per-file failures.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub chunks: Vec<Chunk>,
    pub failures: Vec<LoadFailure>,
}

pub struct ChunkStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChunkStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir, locks: Mutex::new(HashMap::new()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}{}", sanitize_name(source), CHUNK_FILE_SUFFIX))
    }

    pub fn exists(&self, source: &str) -> bool {
        self.path_for(source).is_file()
    }

    /// Replace the stored chunk list for `source`.
    pub fn save(&self, source: &str, chunks: &[Chunk]) -> Result<()> {
        if source.is_empty() {
            return Err(Error::Operation("cannot save chunks for an empty source id".into()));
        }
        check_sequence(source, chunks)
            .map_err(|reason| Error::Operation(format!("refusing to save '{source}': {reason}")))?;

        let path = self.path_for(source);
        let lock = self.lock_for(source);
        let _guard = lock.lock();

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, chunks)
            .map_err(|e| Error::Operation(format!("serialize chunks for '{source}': {e}")))?;
        tmp.flush().map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        debug!(source, chunks = chunks.len(), path = %path.display(), "saved chunk file");
        Ok(())
    }

    /// Load the chunk list for `source`, validating it against the data model.
    pub fn load(&self, source: &str) -> Result<Vec<Chunk>> {
        let path = self.path_for(source);
        if !path.is_file() {
            return Err(Error::NotFound(format!("no chunks stored for '{source}'")));
        }
        let lock = self.lock_for(source);
        let _guard = lock.lock();
        read_chunk_file(&path, Some(source))
    }

    /// Delete the chunk file for `source`. Returns whether a file was removed.
    pub fn remove(&self, source: &str) -> Result<bool> {
        let path = self.path_for(source);
        let lock = self.lock_for(source);
        let _guard = lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(source, "removed chunk file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    /// Aggregate every chunk file in the store, in file-name order.
    ///
    /// A malformed file is recorded in `failures` and skipped.
    pub fn load_all(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for path in self.chunk_files()? {
            match read_chunk_file(&path, None) {
                Ok(chunks) => {
                    debug!(path = %path.display(), chunks = chunks.len(), "loaded chunk file");
                    report.chunks.extend(chunks);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable chunk file");
                    report.failures.push(LoadFailure { path, reason: e.to_string() });
                }
            }
        }
        info!(chunks = report.chunks.len(), failures = report.failures.len(), "loaded corpus");
        Ok(report)
    }

    /// Source ids of every readable chunk file.
    pub fn sources(&self) -> Result<Vec<String>> {
        let report = self.load_all()?;
        let unique: BTreeSet<String> = report.chunks.into_iter().map(|c| c.metadata.source).collect();
        Ok(unique.into_iter().collect())
    }

    pub fn manifest(&self) -> Result<Option<CorpusManifest>> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Corrupt { path, reason: e.to_string() })
    }

    /// Record `settings` as the corpus profile, or check it against the recorded one.
    ///
    /// A different boundary policy is rejected; a different size or overlap is
    /// allowed but logged.
    pub fn ensure_profile(&self, settings: ChunkingSettings) -> Result<()> {
        let requested = CorpusManifest::from(settings);
        match self.manifest()? {
            Some(stored) if stored.boundary != requested.boundary => Err(Error::CorpusMismatch {
                stored: stored.boundary.to_string(),
                requested: requested.boundary.to_string(),
            }),
            Some(stored) => {
                if stored != requested {
                    warn!(?stored, ?requested, "chunk size/overlap differ from the corpus profile");
                }
                Ok(())
            }
            None => {
                let path = self.dir.join(MANIFEST_FILE);
                let json = serde_json::to_vec_pretty(&requested)
                    .map_err(|e| Error::Operation(format!("serialize corpus manifest: {e}")))?;
                fs::write(&path, json).map_err(|e| Error::io(&path, e))
            }
        }
    }

    fn chunk_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.dir, e)),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(CHUNK_FILE_SUFFIX)))
            .collect();
        files.sort();
        Ok(files)
    }

    fn lock_for(&self, source: &str) -> Arc<Mutex<()>> {
        self.locks.lock().entry(source.to_string()).or_default().clone()
    }
}

fn read_chunk_file(path: &Path, expected_source: Option<&str>) -> Result<Vec<Chunk>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Corrupt { path: path.to_path_buf(), reason: e.to_string() })?;
    let source = match (expected_source, chunks.first()) {
        (Some(s), _) => s.to_string(),
        (None, Some(first)) => first.metadata.source.clone(),
        (None, None) => return Err(Error::Corrupt { path: path.to_path_buf(), reason: "empty chunk list".into() }),
    };
    check_sequence(&source, &chunks).map_err(|reason| Error::Corrupt { path: path.to_path_buf(), reason })?;
    Ok(chunks)
}

/// One source, indices `0..n` in order, and `total_chunks == n` everywhere.
fn check_sequence(source: &str, chunks: &[Chunk]) -> std::result::Result<(), String> {
    if chunks.is_empty() {
        return Err("empty chunk list".into());
    }
    let n = chunks.len();
    for (i, c) in chunks.iter().enumerate() {
        let m = &c.metadata;
        if m.source != source {
            return Err(format!("chunk {i} belongs to '{}', expected '{source}'", m.source));
        }
        if m.chunk_index != i {
            return Err(format!("chunk at position {i} has chunk_index {}", m.chunk_index));
        }
        if m.total_chunks != n {
            return Err(format!("chunk {i} has total_chunks {}, file holds {n}", m.total_chunks));
        }
    }
    Ok(())
}
