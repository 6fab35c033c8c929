use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chunker::Chunker;
use crate::error::{Error, Result};
use crate::store::{sanitize_name, ChunkStore};
use crate::types::{DocumentMeta, ExtractedDocument};

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Turns text produced by the document extractor into stored chunk files.
pub struct DataProcessor<'a> {
    chunker: Chunker,
    store: &'a ChunkStore,
}

impl<'a> DataProcessor<'a> {
    /// Pins the corpus to the chunker's boundary policy on first use.
    pub fn new(chunker: Chunker, store: &'a ChunkStore) -> Result<Self> {
        store.ensure_profile(chunker.settings())?;
        Ok(Self { chunker, store })
    }

    /// Chunk one document and replace its stored chunk list. Returns the chunk count.
    pub fn process_document(&self, doc: &ExtractedDocument) -> Result<usize> {
        let chunks = self.chunker.chunk(&doc.text, &doc.meta);
        if chunks.is_empty() {
            return Err(Error::Operation(format!("'{}' has no text to chunk", doc.meta.source)));
        }
        self.store.save(&doc.meta.source, &chunks)?;
        Ok(chunks.len())
    }

    /// Ingest every `.txt`/`.md` file under `data_dir`.
    ///
    /// Sources that already have a chunk file are skipped unless `force`.
    /// A file that fails is counted and logged; the run continues.
    pub fn process_directory(&self, data_dir: &Path, force: bool) -> Result<IngestReport> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("text directory {}", data_dir.display())));
        }
        let files = list_text_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no extracted text files found");
            return Ok(IngestReport::default());
        }
        info!(files = files.len(), dir = %data_dir.display(), "ingesting extracted text");

        let mut report = IngestReport::default();
        for (file_index, file_path) in files.iter().enumerate() {
            let meta = document_meta(file_path);
            if !force && self.store.exists(&meta.source) {
                info!(source = %meta.source, "already processed, skipping");
                report.skipped += 1;
                continue;
            }
            info!("Processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let outcome = read_file_content(file_path)
                .and_then(|text| self.process_document(&ExtractedDocument { text, meta: meta.clone() }));
            match outcome {
                Ok(n) => {
                    info!(source = %meta.source, chunks = n, "processed");
                    report.processed += 1;
                }
                Err(e) => {
                    warn!(source = %meta.source, error = %e, "failed to process");
                    report.failed += 1;
                }
            }
        }
        info!(processed = report.processed, skipped = report.skipped, failed = report.failed, "ingest finished");
        Ok(report)
    }
}

fn document_meta(file_path: &Path) -> DocumentMeta {
    let source = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string());
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source.clone());
    DocumentMeta::new(source)
        .with_title(sanitize_name(&stem))
        .with_path(file_path.to_string_lossy().to_string())
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path).map_err(|e| Error::io(file_path, e))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("txt" | "md")))
        .collect();
    files.sort();
    files
}
