//! Corpus exports for external RAG front ends.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMetadata};

/// Write one `{text, metadata:{source, chunk_id, total_chunks}}` object per line.
pub fn export_jsonl(chunks: &[Chunk], out: &Path) -> Result<usize> {
    let file = File::create(out).map_err(|e| Error::io(out, e))?;
    let mut w = BufWriter::new(file);
    for chunk in chunks {
        let line = json!({
            "text": chunk.text,
            "metadata": {
                "source": chunk.metadata.source,
                "chunk_id": chunk.metadata.chunk_index,
                "total_chunks": chunk.metadata.total_chunks,
            }
        });
        serde_json::to_writer(&mut w, &line).map_err(|e| Error::Operation(format!("write jsonl: {e}")))?;
        w.write_all(b"\n").map_err(|e| Error::io(out, e))?;
    }
    w.flush().map_err(|e| Error::io(out, e))?;
    Ok(chunks.len())
}

#[derive(Debug, Serialize)]
pub struct Collection {
    pub name: String,
    pub documents: Vec<CollectionDocument>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDocument {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content_chunks: Vec<CollectionChunk>,
}

#[derive(Debug, Serialize)]
pub struct CollectionChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Group chunks by source into a named document collection.
///
/// Ids are derived from the source and chunk index, so re-exporting an
/// unchanged corpus yields identical output.
pub fn build_collection(chunks: &[Chunk], name: &str) -> Collection {
    let mut by_source: BTreeMap<&str, Vec<&Chunk>> = BTreeMap::new();
    for chunk in chunks {
        by_source.entry(chunk.metadata.source.as_str()).or_default().push(chunk);
    }
    let documents = by_source
        .into_iter()
        .map(|(source, doc_chunks)| CollectionDocument {
            id: stable_id(&[source]),
            url: String::new(),
            title: doc_chunks
                .first()
                .and_then(|c| c.metadata.title.clone())
                .unwrap_or_else(|| source.to_string()),
            content_chunks: doc_chunks
                .into_iter()
                .map(|c| CollectionChunk {
                    id: stable_id(&[source, &c.metadata.chunk_index.to_string()]),
                    content: c.text.clone(),
                    metadata: c.metadata.clone(),
                })
                .collect(),
        })
        .collect();
    Collection { name: name.to_string(), documents }
}

pub fn export_collection(chunks: &[Chunk], name: &str, out: &Path) -> Result<usize> {
    let collection = build_collection(chunks, name);
    let file = File::create(out).map_err(|e| Error::io(out, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &collection)
        .map_err(|e| Error::Operation(format!("write collection: {e}")))?;
    Ok(collection.documents.len())
}

fn stable_id(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().as_str()[..32].to_string()
}
